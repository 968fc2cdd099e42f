//! Common Test Utilities
//!
//! In-memory stores, test application state and token helpers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use chrono::Utc;
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceExt;

use clinic_chat::config::{
    CorsSettings, DatabaseSettings, HousekeepingSettings, JwtSettings, MonitoringSettings,
    ServerSettings, Settings, WebSocketSettings,
};
use clinic_chat::domain::{
    resolve_file_url, Chat, ChatRepository, Message, MessageRepository, NewMessage,
};
use clinic_chat::presentation::http::create_router;
use clinic_chat::presentation::middleware::Claims;
use clinic_chat::presentation::websocket::{ConnectedSession, Outbound, ServerEvent};
use clinic_chat::shared::error::AppError;
use clinic_chat::startup::AppState;

pub const TEST_SECRET: &str = "integration-test-secret-with-32-plus-chars";

/// Patient and doctor of the default test chat
pub const PATIENT_ID: i64 = 42;
pub const DOCTOR_ID: i64 = 7;
pub const CHAT_ID: i64 = 5;

pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://localhost/clinic_test".into(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
        },
        jwt: JwtSettings {
            secret: TEST_SECRET.into(),
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        websocket: WebSocketSettings::default(),
        housekeeping: HousekeepingSettings::default(),
        monitoring: MonitoringSettings::default(),
        environment: "test".into(),
    }
}

/// Chat store backed by a vector
#[derive(Default)]
pub struct InMemoryChatRepository {
    chats: Mutex<Vec<Chat>>,
    pub lookups: AtomicUsize,
}

impl InMemoryChatRepository {
    pub fn with_chat(id: i64, patient_id: i64, doctor_id: i64) -> Self {
        let repo = Self::default();
        repo.chats.lock().push(Chat {
            id,
            consultation_id: Some(id * 10),
            patient_id,
            doctor_id,
            created_at: Utc::now(),
        });
        repo
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.chats.lock().iter().find(|c| c.id == id).cloned())
    }
}

/// Message store backed by a vector; ids start at 1
#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Mutex<Vec<Message>>,
    pub creates: AtomicUsize,
    pub read_updates: AtomicUsize,
}

impl InMemoryMessageRepository {
    pub fn all(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn get(&self, id: i64) -> Option<Message> {
        self.messages.lock().iter().find(|m| m.id == id).cloned()
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn read_update_count(&self) -> usize {
        self.read_updates.load(Ordering::SeqCst)
    }

    /// Insert a message directly, bypassing the broker
    pub fn seed(&self, chat_id: i64, sender_id: i64, content: &str) -> Message {
        let mut messages = self.messages.lock();
        let now = Utc::now();
        let message = Message {
            id: messages.len() as i64 + 1,
            chat_id,
            sender_id,
            message_type: Default::default(),
            content: Some(content.into()),
            file_url: None,
            read_at: None,
            created_at: now,
            updated_at: now,
        };
        messages.push(message.clone());
        message
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        Ok(self.get(id))
    }

    async fn find_by_chat(
        &self,
        chat_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        // Newest page first, oldest-first within the page, like the Postgres store
        let mut page: Vec<Message> = self
            .messages
            .lock()
            .iter()
            .rev()
            .filter(|m| m.chat_id == chat_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        page.reverse();
        Ok(page)
    }

    async fn create(&self, new_message: &NewMessage) -> Result<Message, AppError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut messages = self.messages.lock();
        let now = Utc::now();
        let message = Message {
            id: messages.len() as i64 + 1,
            chat_id: new_message.chat_id,
            sender_id: new_message.sender_id,
            message_type: new_message.message_type,
            content: new_message.content.clone(),
            file_url: new_message.file_ref.as_deref().map(resolve_file_url),
            read_at: None,
            created_at: now,
            updated_at: now,
        };
        messages.push(message.clone());
        Ok(message)
    }

    async fn mark_as_read(&self, id: i64) -> Result<Message, AppError> {
        self.read_updates.fetch_add(1, Ordering::SeqCst);
        let mut messages = self.messages.lock();
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| AppError::NotFound(format!("message {}", id)))?;
        if message.read_at.is_none() {
            let now = Utc::now();
            message.read_at = Some(now);
            message.updated_at = now;
        }
        Ok(message.clone())
    }
}

/// Test application with in-memory stores
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub chats: Arc<InMemoryChatRepository>,
    pub messages: Arc<InMemoryMessageRepository>,
}

impl TestApp {
    /// One consultation chat between the test patient and doctor
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let chats = Arc::new(InMemoryChatRepository::with_chat(CHAT_ID, PATIENT_ID, DOCTOR_ID));
        let messages = Arc::new(InMemoryMessageRepository::default());
        let state = AppState::new(settings, chats.clone(), messages.clone());
        let router = create_router(state.clone());

        Self {
            state,
            router,
            chats,
            messages,
        }
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// Make a WebSocket upgrade request
    pub async fn upgrade(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .header("Connection", "upgrade")
                    .header("Upgrade", "websocket")
                    .header("Sec-WebSocket-Version", "13")
                    .header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Serve the router on an ephemeral local port
    pub async fn spawn_server(&self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    /// Register a connection the way the socket handler does
    pub fn connect(&self, user_id: i64) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = self.state.gateway.register_session(user_id, tx);
        TestClient { session, rx }
    }
}

/// A registered connection and its outbound queue
pub struct TestClient {
    pub session: Arc<ConnectedSession>,
    pub rx: mpsc::UnboundedReceiver<Outbound>,
}

impl TestClient {
    /// Queued events, in order, excluding close requests
    pub fn events(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(outbound) = self.rx.try_recv() {
            if let Outbound::Event(event) = outbound {
                events.push(event);
            }
        }
        events
    }
}

pub fn token_with(claims: &Claims, secret: &str) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// A valid token for `user_id`
pub fn token_for(user_id: i64) -> String {
    let now = Utc::now().timestamp();
    token_with(
        &Claims {
            sub: None,
            id: Some(user_id),
            exp: now + 3600,
            iat: now,
        },
        TEST_SECRET,
    )
}

/// Random message text
pub fn sentence() -> String {
    Sentence(3..8).fake()
}
