//! Application Startup
//!
//! Application building, background tasks and server lifecycle.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;

use crate::config::Settings;
use crate::domain::{ChatRepository, MessageRepository};
use crate::infrastructure::database;
use crate::infrastructure::memory::ProcStatusProbe;
use crate::infrastructure::metrics::StatsCollector;
use crate::infrastructure::repositories::{PgChatRepository, PgMessageRepository};
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::{BackgroundTasks, ChatBroker, Gateway, Housekeeper, PayloadLimits};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub broker: Arc<ChatBroker>,
    pub stats: Arc<StatsCollector>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the gateway, broker and stats around the given stores
    pub fn new(
        settings: Settings,
        chats: Arc<dyn ChatRepository>,
        messages: Arc<dyn MessageRepository>,
    ) -> Self {
        let stats = Arc::new(StatsCollector::new(
            settings.monitoring.connection_warning_threshold,
        ));
        let gateway = Arc::new(Gateway::new(stats.clone()));
        let broker = Arc::new(ChatBroker::new(
            chats,
            messages,
            gateway.clone(),
            stats.clone(),
            PayloadLimits::from(&settings.websocket),
        ));

        Self {
            gateway,
            broker,
            stats,
            settings: Arc::new(settings),
        }
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    tasks: BackgroundTasks,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        let chats: Arc<dyn ChatRepository> = Arc::new(PgChatRepository::new(db.clone()));
        let messages: Arc<dyn MessageRepository> = Arc::new(PgMessageRepository::new(db));

        let state = AppState::new(settings.clone(), chats, messages);

        // Background sweeps and stats reporting
        let housekeeper = Arc::new(Housekeeper::new(
            state.gateway.clone(),
            settings.housekeeping.clone(),
            Arc::new(ProcStatusProbe),
        ));
        let mut tasks = housekeeper.start();
        tasks.push(
            state
                .stats
                .clone()
                .spawn_reporter(settings.monitoring.report_interval()),
        );

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(logging::create_trace_layer())
            .layer(cors::create_cors_layer(&settings.cors));

        // Bind to address
        let addr = settings.server_addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            tasks,
        })
    }

    /// Run the server until Ctrl-C, then stop the background tasks
    pub async fn run_until_stopped(self) -> Result<()> {
        let Self {
            listener,
            router,
            tasks,
        } = self;

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        tasks.stop();
        served?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
