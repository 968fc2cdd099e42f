//! WebSocket Message Types
//!
//! Chat gateway frame formats. Every frame is a JSON object
//! `{"event": "<name>", "data": {...}}` in both directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationErrors};

use crate::domain::{Message, MessageType, NewMessage};

/// Incoming gateway event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChat(ChatRef),
    LeaveChat(ChatRef),
    GetMessages(GetMessagesPayload),
    SendMessage(SendMessagePayload),
    UploadFile(UploadFilePayload),
    Typing(TypingPayload),
    MarkAsRead(MarkAsReadPayload),
}

impl ClientEvent {
    /// Get the event name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinChat(_) => "join_chat",
            ClientEvent::LeaveChat(_) => "leave_chat",
            ClientEvent::GetMessages(_) => "get_messages",
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::UploadFile(_) => "upload_file",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::MarkAsRead(_) => "mark_as_read",
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            ClientEvent::JoinChat(p) | ClientEvent::LeaveChat(p) => p.validate(),
            ClientEvent::GetMessages(p) => p.validate(),
            ClientEvent::SendMessage(p) => p.validate(),
            ClientEvent::UploadFile(p) => p.validate(),
            ClientEvent::Typing(p) => p.validate(),
            ClientEvent::MarkAsRead(p) => p.validate(),
        }
    }
}

/// Ids arrive as numbers from most clients and as strings from some.
fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Int(i64),
        Str(String),
    }

    match IdRepr::deserialize(deserializer)? {
        IdRepr::Int(id) => Ok(id),
        IdRepr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// `join_chat` / `leave_chat` payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRef {
    #[serde(deserialize_with = "deserialize_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub chat_id: i64,
}

/// `get_messages` payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetMessagesPayload {
    #[serde(deserialize_with = "deserialize_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub chat_id: i64,
    /// 1-based page number
    #[serde(default)]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub page: Option<i64>,
}

/// `send_message` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[serde(deserialize_with = "deserialize_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub chat_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

/// `upload_file` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadFilePayload {
    #[serde(deserialize_with = "deserialize_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub chat_id: i64,
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Set when the file was already stored by the upload service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_data: Option<String>,
    /// Optional caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `typing` payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    #[serde(deserialize_with = "deserialize_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub chat_id: i64,
    #[serde(default)]
    pub is_typing: bool,
}

/// `mark_as_read` payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadPayload {
    #[serde(deserialize_with = "deserialize_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub chat_id: i64,
    #[serde(deserialize_with = "deserialize_id")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub message_id: i64,
}

/// Reasons a message payload cannot be turned into a [`MessageBody`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Message content is required")]
    EmptyMessage,

    #[error("A file is required for {0} messages")]
    MissingFile(MessageType),

    #[error("Unsupported message type: {0}")]
    UnknownMessageType(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
}

/// A message payload after field normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text {
        content: String,
    },
    Media {
        kind: MessageType,
        /// File URL or bare file name
        file: String,
        caption: Option<String>,
    },
}

impl MessageBody {
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::Text { .. } => MessageType::Text,
            MessageBody::Media { kind, .. } => *kind,
        }
    }

    /// Build the insert model; the sender is always the connection's principal
    pub fn into_new_message(self, chat_id: i64, sender_id: i64) -> NewMessage {
        let message_type = self.message_type();
        let (content, file_ref) = match self {
            MessageBody::Text { content } => (Some(content), None),
            MessageBody::Media { file, caption, .. } => (caption, Some(file)),
        };

        NewMessage {
            chat_id,
            sender_id,
            message_type,
            content,
            file_ref,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn explicit_type(value: &Option<String>) -> Result<Option<MessageType>, PayloadError> {
    match non_empty(value) {
        Some(raw) => MessageType::parse(&raw)
            .map(Some)
            .ok_or(PayloadError::UnknownMessageType(raw)),
        None => Ok(None),
    }
}

impl SendMessagePayload {
    /// Resolve the shape-shifting fields into a single [`MessageBody`].
    ///
    /// Type: explicit `messageType`, else inferred from `fileType` or the
    /// file name, else text. Content: `message`, else `textContent`.
    /// File: `fileUrl`, else `fileName`.
    pub fn normalize(&self) -> Result<MessageBody, PayloadError> {
        let content = non_empty(&self.message).or_else(|| non_empty(&self.text_content));
        let file = non_empty(&self.file_url).or_else(|| non_empty(&self.file_name));

        let inferred = || {
            self.file_type
                .as_deref()
                .and_then(MessageType::from_mime)
                .or_else(|| file.as_deref().and_then(MessageType::from_file_name))
        };
        let kind = explicit_type(&self.message_type)?
            .or_else(inferred)
            .unwrap_or_default();

        match (kind, file) {
            (MessageType::Text, None) => content
                .map(|content| MessageBody::Text { content })
                .ok_or(PayloadError::EmptyMessage),
            (MessageType::Text, Some(file)) => Err(PayloadError::UnsupportedFileType(
                non_empty(&self.file_type).unwrap_or(file),
            )),
            (kind, Some(file)) => Ok(MessageBody::Media {
                kind,
                file,
                caption: content,
            }),
            (kind, None) => Err(PayloadError::MissingFile(kind)),
        }
    }
}

impl UploadFilePayload {
    /// Size of the uploaded file: the declared size, else the length of the
    /// inline file data, else the length of the chunk.
    pub fn declared_size(&self) -> usize {
        self.file_size
            .map(|size| usize::try_from(size).unwrap_or(usize::MAX))
            .or_else(|| self.file_data.as_ref().map(String::len))
            .or_else(|| self.chunk_data.as_ref().map(String::len))
            .unwrap_or(0)
    }

    pub fn normalize(&self) -> Result<MessageBody, PayloadError> {
        let kind = explicit_type(&self.message_type)?
            .or_else(|| self.file_type.as_deref().and_then(MessageType::from_mime))
            .or_else(|| MessageType::from_file_name(&self.file_name))
            .filter(MessageType::is_media)
            .ok_or_else(|| {
                PayloadError::UnsupportedFileType(
                    non_empty(&self.file_type).unwrap_or_else(|| self.file_name.clone()),
                )
            })?;

        let file = non_empty(&self.file_url).unwrap_or_else(|| self.file_name.trim().to_string());

        Ok(MessageBody::Media {
            kind,
            file,
            caption: non_empty(&self.message),
        })
    }
}

/// Outgoing gateway event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    UserJoined(MembershipEvent),
    UserLeft(MembershipEvent),
    ReceiveMessage(MessagePayload),
    MessagesLoaded(MessagesLoadedEvent),
    FileUploaded(FileUploadedEvent),
    UserTyping(TypingEvent),
    MessageRead(MessageReadEvent),
    MessageReadAck(MessageReadAckEvent),
    Error(ErrorEvent),
}

impl ServerEvent {
    /// Get the event name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::UserJoined(_) => "user_joined",
            ServerEvent::UserLeft(_) => "user_left",
            ServerEvent::ReceiveMessage(_) => "receive_message",
            ServerEvent::MessagesLoaded(_) => "messages_loaded",
            ServerEvent::FileUploaded(_) => "file_uploaded",
            ServerEvent::UserTyping(_) => "user_typing",
            ServerEvent::MessageRead(_) => "message_read",
            ServerEvent::MessageReadAck(_) => "message_read_ack",
            ServerEvent::Error(_) => "error",
        }
    }
}

/// `user_joined` / `user_left`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipEvent {
    pub user_id: i64,
    pub chat_id: i64,
}

/// A persisted message as seen by one recipient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagePayload {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub message_type: MessageType,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_own_message: bool,
}

impl MessagePayload {
    pub fn for_viewer(message: &Message, viewer_id: i64) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            message_type: message.message_type,
            content: message.content.clone(),
            file_url: message.file_url.clone(),
            read_at: message.read_at,
            created_at: message.created_at,
            updated_at: message.updated_at,
            is_own_message: message.sender_id == viewer_id,
        }
    }
}

/// `messages_loaded`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagesLoadedEvent {
    pub chat_id: i64,
    pub page: i64,
    pub messages: Vec<MessagePayload>,
}

/// `file_uploaded`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileUploadedEvent {
    pub message_id: i64,
    pub chat_id: i64,
    pub file_name: String,
    pub file_url: Option<String>,
    pub file_size: usize,
}

/// `user_typing`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypingEvent {
    pub user_id: i64,
    pub chat_id: i64,
    pub is_typing: bool,
}

/// `message_read`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageReadEvent {
    pub message_id: i64,
    pub chat_id: i64,
    pub read_by: i64,
    pub read_at: Option<DateTime<Utc>>,
}

/// `message_read_ack`, sent when a sender marks their own message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageReadAckEvent {
    pub message_id: i64,
    pub chat_id: i64,
    pub self_message: bool,
    pub read_at: Option<DateTime<Utc>>,
}

/// `error`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

/// Item queued on a connection's outbound channel
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(ServerEvent),
    /// Close the socket with the given reason
    Close { reason: String },
}
