//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// JWT verification settings
    pub jwt: JwtSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket and payload limits
    pub websocket: WebSocketSettings,

    /// Background sweep configuration
    pub housekeeping: HousekeepingSettings,

    /// Stats reporting configuration
    pub monitoring: MonitoringSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// JWT verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key the auth service signs tokens with
    pub secret: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Transport-level message cap in bytes.
    /// Kept above `max_payload_bytes` so oversize events reach the broker
    /// and get a proper error reply instead of a dropped socket.
    pub max_message_size: usize,

    /// Maximum frame size in bytes
    pub max_frame_size: usize,

    /// Hard ceiling for a message or file event (default: 10MB)
    pub max_payload_bytes: usize,

    /// Payloads above this are accepted but logged (default: 5MB)
    pub payload_warn_bytes: usize,

    /// Number of messages returned by `get_messages`
    pub history_page_size: i64,
}

/// Housekeeping sweep configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HousekeepingSettings {
    /// Interval between inactive-connection sweeps in seconds (default: 300)
    pub inactive_sweep_interval_secs: u64,

    /// Idle time after which a connection is evicted in seconds (default: 7200)
    pub inactive_threshold_secs: u64,

    /// Interval between memory sweeps in seconds (default: 60)
    pub memory_sweep_interval_secs: u64,

    /// Soft resident-memory ceiling in megabytes (default: 300)
    pub memory_ceiling_mb: u64,
}

/// Stats reporter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringSettings {
    /// Interval between stats reports in seconds (default: 300)
    pub report_interval_secs: u64,

    /// Active connection count that triggers a warning (default: 1000)
    pub connection_warning_threshold: u64,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.max_message_size", 16_777_216_i64)? // 16MB
            .set_default("websocket.max_frame_size", 16_777_216_i64)?
            .set_default("websocket.max_payload_bytes", 10_485_760_i64)? // 10MB
            .set_default("websocket.payload_warn_bytes", 5_242_880_i64)? // 5MB
            .set_default("websocket.history_page_size", 50)?
            .set_default("housekeeping.inactive_sweep_interval_secs", 300)?
            .set_default("housekeeping.inactive_threshold_secs", 7200)?
            .set_default("housekeeping.memory_sweep_interval_secs", 60)?
            .set_default("housekeeping.memory_ceiling_mb", 300)?
            .set_default("monitoring.report_interval_secs", 300)?
            .set_default("monitoring.connection_warning_threshold", 1000)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate())
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.websocket.payload_warn_bytes > self.websocket.max_payload_bytes {
            return Err(ConfigError::Message(
                "websocket.payload_warn_bytes must not exceed websocket.max_payload_bytes".into(),
            ));
        }
        if self.websocket.history_page_size < 1 {
            return Err(ConfigError::Message(
                "websocket.history_page_size must be at least 1".into(),
            ));
        }

        // tokio intervals panic on a zero period
        let intervals = [
            (
                "housekeeping.inactive_sweep_interval_secs",
                self.housekeeping.inactive_sweep_interval_secs,
            ),
            (
                "housekeeping.memory_sweep_interval_secs",
                self.housekeeping.memory_sweep_interval_secs,
            ),
            (
                "monitoring.report_interval_secs",
                self.monitoring.report_interval_secs,
            ),
        ];
        if let Some((key, _)) = intervals.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Message(format!("{} must be greater than zero", key)));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl HousekeepingSettings {
    pub fn inactive_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.inactive_sweep_interval_secs)
    }

    pub fn inactive_threshold(&self) -> Duration {
        Duration::from_secs(self.inactive_threshold_secs)
    }

    pub fn memory_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.memory_sweep_interval_secs)
    }

    pub fn memory_ceiling_bytes(&self) -> u64 {
        self.memory_ceiling_mb * 1024 * 1024
    }
}

impl Default for HousekeepingSettings {
    fn default() -> Self {
        Self {
            inactive_sweep_interval_secs: 300,
            inactive_threshold_secs: 7200,
            memory_sweep_interval_secs: 60,
            memory_ceiling_mb: 300,
        }
    }
}

impl MonitoringSettings {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            report_interval_secs: 300,
            connection_warning_threshold: 1000,
        }
    }
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            max_message_size: 16 * 1024 * 1024,
            max_frame_size: 16 * 1024 * 1024,
            max_payload_bytes: 10 * 1024 * 1024,
            payload_warn_bytes: 5 * 1024 * 1024,
            history_page_size: 50,
        }
    }
}
