//! # Clinic Chat Gateway
//!
//! Entry point that initializes:
//! - Tracing/logging subsystem and the panic hook
//! - Configuration loading
//! - Database connection pool
//! - WebSocket gateway, housekeeping and stats reporting

use anyhow::Result;
use tracing::info;

use clinic_chat::config::Settings;
use clinic_chat::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    clinic_chat::telemetry::init_tracing();
    clinic_chat::telemetry::install_panic_hook();

    info!("Starting clinic chat gateway...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
