//! # Clinic Chat Gateway
//!
//! Real-time consultation chat between patients and doctors:
//! - WebSocket gateway with token-authenticated handshakes
//! - Chat rooms, message delivery and read receipts
//! - Payload size guard, idle eviction and memory sampling
//! - Connection/message/error stats with Prometheus export
//!
//! ## Module Structure
//!
//! ```text
//! clinic_chat/
//! +-- config/         Configuration management
//! +-- domain/         Chat and message entities, store traits
//! +-- infrastructure/ PostgreSQL stores, metrics, memory probe
//! +-- presentation/   HTTP routes, auth extractor, WebSocket gateway
//! +-- shared/         Common utilities (errors, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core entities and store traits
pub mod domain;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
