//! Message entity and repository trait.
//!
//! Maps to the `messages` table owned by the consultation backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Public path prefix for chat files referenced by bare file name.
pub const CHAT_UPLOADS_PATH: &str = "/uploads/chat";

/// Message kinds matching the `message_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text message
    #[default]
    Text,
    Image,
    Video,
    Audio,
}

impl MessageType {
    /// Parse from the database/wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    /// Whether this type carries a file.
    pub fn is_media(&self) -> bool {
        !matches!(self, Self::Text)
    }

    /// Infer a media type from a MIME type such as `image/png`.
    ///
    /// A bare kind (`"image"`) is accepted as well. Returns `None` for
    /// anything that is not image, video or audio.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let kind = mime.split('/').next().unwrap_or_default();
        Self::parse(kind).filter(Self::is_media)
    }

    /// Infer a media type from a file extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "heic" | "svg" => Some(Self::Image),
            "mp4" | "mov" | "webm" | "mkv" | "avi" | "m4v" => Some(Self::Video),
            "mp3" | "wav" | "ogg" | "m4a" | "aac" | "flac" | "opus" => Some(Self::Audio),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted chat message.
///
/// Maps to the `messages` table:
/// - id: SERIAL PRIMARY KEY
/// - chat_id: INTEGER NOT NULL REFERENCES chats(id)
/// - sender_id: INTEGER NOT NULL REFERENCES users(id)
/// - message_type: TEXT NOT NULL DEFAULT 'text'
/// - content: TEXT NULL
/// - file_url: TEXT NULL
/// - read_at: TIMESTAMPTZ NULL
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub message_type: MessageType,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for a new message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: i64,
    /// Always the authenticated principal of the sending connection
    pub sender_id: i64,
    pub message_type: MessageType,
    pub content: Option<String>,
    /// File URL or bare file name, resolved on insert
    pub file_ref: Option<String>,
}

/// Resolve a stored file reference into a URL clients can fetch.
///
/// Absolute URLs and rooted paths are kept, bare file names are placed
/// under [`CHAT_UPLOADS_PATH`].
pub fn resolve_file_url(file_ref: &str) -> String {
    let file_ref = file_ref.trim();
    if file_ref.contains("://") || file_ref.starts_with('/') {
        file_ref.to_string()
    } else {
        format!("{}/{}", CHAT_UPLOADS_PATH, file_ref)
    }
}

/// Repository trait for Message data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Find a message by its ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Page through a chat's history, oldest first within the page.
    async fn find_by_chat(
        &self,
        chat_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// Persist a new message and return the stored record.
    async fn create(&self, message: &NewMessage) -> Result<Message, AppError>;

    /// Stamp `read_at` and return the updated record.
    async fn mark_as_read(&self, id: i64) -> Result<Message, AppError>;
}
