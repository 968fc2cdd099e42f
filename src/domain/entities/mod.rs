//! # Domain Entities
//!
//! The records the chat gateway reads and writes through the stores.
//!
//! - **Chat**: a consultation conversation, looked up before any room action
//! - **Message**: a persisted chat message
//!
//! Each entity has a repository trait; implementations live in the
//! infrastructure layer.

mod chat;
mod message;

pub use chat::{Chat, ChatRepository};
pub use message::{
    resolve_file_url, Message, MessageRepository, MessageType, NewMessage, CHAT_UPLOADS_PATH,
};

#[cfg(test)]
pub use chat::MockChatRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
