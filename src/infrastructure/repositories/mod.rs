//! Repository Implementations
//!
//! PostgreSQL implementations of the domain repository traits.
//!
//! - **PgChatRepository** - chat existence lookups
//! - **PgMessageRepository** - message create, history paging and read receipts
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use clinic_chat::infrastructure::repositories::{PgChatRepository, PgMessageRepository};
//!
//! let chats = Arc::new(PgChatRepository::new(pool.clone()));
//! let messages = Arc::new(PgMessageRepository::new(pool));
//! ```

pub mod chat_repository;
pub mod message_repository;

pub use chat_repository::PgChatRepository;
pub use message_repository::PgMessageRepository;
