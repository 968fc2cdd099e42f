//! Chat Broker
//!
//! Validates inbound chat events, persists them through the stores and fans
//! them out to room members. Every event runs
//! `size check -> chat lookup -> membership -> normalize -> persist -> deliver`
//! and any failure is reported to the calling connection only.

use std::sync::Arc;

use serde::Serialize;

use super::gateway::Gateway;
use super::messages::{
    ClientEvent, ErrorEvent, FileUploadedEvent, GetMessagesPayload, MarkAsReadPayload,
    MembershipEvent, MessagePayload, MessageReadAckEvent, MessageReadEvent, MessagesLoadedEvent,
    PayloadError, SendMessagePayload, ServerEvent, TypingEvent, TypingPayload, UploadFilePayload,
};
use super::session::ConnectedSession;
use crate::config::WebSocketSettings;
use crate::domain::{Chat, ChatRepository, Message, MessageRepository};
use crate::infrastructure::metrics::StatsCollector;
use crate::shared::error::AppError;
use crate::shared::validation::validation_message;

/// Size limits and paging applied by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimits {
    /// Hard ceiling; larger payloads are rejected
    pub max_payload_bytes: usize,
    /// Soft threshold; larger payloads are accepted with a warning
    pub payload_warn_bytes: usize,
    pub history_page_size: i64,
}

impl From<&WebSocketSettings> for PayloadLimits {
    fn from(settings: &WebSocketSettings) -> Self {
        Self {
            max_payload_bytes: settings.max_payload_bytes,
            payload_warn_bytes: settings.payload_warn_bytes,
            history_page_size: settings.history_page_size,
        }
    }
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self::from(&WebSocketSettings::default())
    }
}

/// Chat event failures, reported to the caller as an `error` event
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Chat not found")]
    ChatNotFound(i64),

    #[error("Message not found")]
    MessageNotFound(i64),

    #[error("You must join the chat before using it")]
    JoinRequired(i64),

    #[error("Payload size of {size} bytes exceeds the maximum of {limit} bytes")]
    PayloadTooLarge { limit: usize, size: usize },

    #[error("{0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Store error: {0}")]
    Store(#[from] AppError),
}

impl BrokerError {
    /// Machine-readable code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            BrokerError::ChatNotFound(_) | BrokerError::MessageNotFound(_) => "NOT_FOUND",
            BrokerError::JoinRequired(_) => "JOIN_REQUIRED",
            BrokerError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            BrokerError::InvalidPayload(_) | BrokerError::Payload(_) => "INVALID_PAYLOAD",
            BrokerError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing event; store details never leave the server
    pub fn to_event(&self, action: &str) -> ErrorEvent {
        let message = match self {
            BrokerError::Store(_) => format!("Failed to {}", action),
            other => other.to_string(),
        };
        let (limit, size) = match self {
            BrokerError::PayloadTooLarge { limit, size } => (Some(*limit), Some(*size)),
            _ => (None, None),
        };

        ErrorEvent {
            message,
            code: self.code(),
            limit,
            size,
        }
    }
}

/// Human-readable action for generic failure messages
fn action_for(event: &str) -> &'static str {
    match event {
        "join_chat" => "join chat",
        "leave_chat" => "leave chat",
        "get_messages" => "load messages",
        "send_message" => "send message",
        "upload_file" => "upload file",
        "mark_as_read" => "mark message as read",
        _ => "process request",
    }
}

fn serialized_size<T: Serialize>(payload: &T) -> usize {
    serde_json::to_vec(payload).map(|bytes| bytes.len()).unwrap_or(0)
}

/// Validates, persists and delivers chat events
pub struct ChatBroker {
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
    gateway: Arc<Gateway>,
    stats: Arc<StatsCollector>,
    limits: PayloadLimits,
}

impl ChatBroker {
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        messages: Arc<dyn MessageRepository>,
        gateway: Arc<Gateway>,
        stats: Arc<StatsCollector>,
        limits: PayloadLimits,
    ) -> Self {
        Self {
            chats,
            messages,
            gateway,
            stats,
            limits,
        }
    }

    /// Handle one inbound event for a connection
    pub async fn handle_event(&self, session: &ConnectedSession, event: ClientEvent) {
        session.touch();
        let name = event.name();

        if let Err(errors) = event.validate() {
            let error = BrokerError::InvalidPayload(validation_message(&errors));
            if let ClientEvent::Typing(_) = event {
                tracing::debug!(
                    user_id = session.user_id,
                    error = %error,
                    "Typing indicator dropped"
                );
            } else {
                self.report_error(session, name, error);
            }
            return;
        }

        let result = match event {
            ClientEvent::JoinChat(p) => self.join_chat(session, p.chat_id).await,
            ClientEvent::LeaveChat(p) => self.leave_chat(session, p.chat_id).await,
            ClientEvent::GetMessages(p) => self.get_messages(session, p).await,
            ClientEvent::SendMessage(p) => self.send_message(session, p).await,
            ClientEvent::UploadFile(p) => self.upload_file(session, p).await,
            ClientEvent::Typing(p) => {
                self.typing(session, p).await;
                Ok(())
            }
            ClientEvent::MarkAsRead(p) => self.mark_as_read(session, p).await,
        };

        if let Err(error) = result {
            self.report_error(session, name, error);
        }
    }

    /// Report a frame that could not be decoded into an event
    pub fn reject_frame(&self, session: &ConnectedSession, detail: &str) {
        tracing::debug!(
            user_id = session.user_id,
            connection_id = %session.id,
            detail = detail,
            "Malformed frame"
        );
        self.report_error(
            session,
            "frame",
            BrokerError::InvalidPayload("Invalid event payload".into()),
        );
    }

    pub async fn join_chat(&self, session: &ConnectedSession, chat_id: i64) -> Result<(), BrokerError> {
        self.require_chat(chat_id).await?;

        if self.gateway.join_room(session, chat_id) {
            let event = ServerEvent::UserJoined(MembershipEvent {
                user_id: session.user_id,
                chat_id,
            });
            self.gateway.send_to_room(chat_id, &event, Some(session.id));
        }

        tracing::info!(
            user_id = session.user_id,
            connection_id = %session.id,
            chat_id = chat_id,
            "Joined chat"
        );
        Ok(())
    }

    pub async fn leave_chat(&self, session: &ConnectedSession, chat_id: i64) -> Result<(), BrokerError> {
        self.require_chat(chat_id).await?;

        if self.gateway.leave_room(session, chat_id) {
            let event = ServerEvent::UserLeft(MembershipEvent {
                user_id: session.user_id,
                chat_id,
            });
            self.gateway.send_to_room(chat_id, &event, None);
            tracing::info!(
                user_id = session.user_id,
                connection_id = %session.id,
                chat_id = chat_id,
                "Left chat"
            );
        } else {
            tracing::debug!(
                user_id = session.user_id,
                chat_id = chat_id,
                "Leave requested for a chat that was never joined"
            );
        }
        Ok(())
    }

    pub async fn get_messages(
        &self,
        session: &ConnectedSession,
        payload: GetMessagesPayload,
    ) -> Result<(), BrokerError> {
        let chat_id = payload.chat_id;
        self.require_room(session, chat_id).await?;

        let page = payload.page.unwrap_or(1).max(1);
        let limit = self.limits.history_page_size;
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| BrokerError::InvalidPayload(format!("page: {} is out of range", page)))?;
        let history = self.messages.find_by_chat(chat_id, limit, offset).await?;

        let messages = history
            .iter()
            .map(|m| MessagePayload::for_viewer(m, session.user_id))
            .collect();
        session.send(ServerEvent::MessagesLoaded(MessagesLoadedEvent {
            chat_id,
            page,
            messages,
        }));
        Ok(())
    }

    pub async fn send_message(
        &self,
        session: &ConnectedSession,
        payload: SendMessagePayload,
    ) -> Result<(), BrokerError> {
        let size = serialized_size(&payload);
        self.check_size(session, "message", size)?;
        self.require_room(session, payload.chat_id).await?;
        let body = payload.normalize()?;

        let message = self
            .messages
            .create(&body.into_new_message(payload.chat_id, session.user_id))
            .await?;

        session.record_message(size);
        self.stats.track_message("message");
        self.deliver(session, &message);

        tracing::debug!(
            user_id = session.user_id,
            chat_id = message.chat_id,
            message_id = message.id,
            message_type = %message.message_type,
            size = size,
            "Message delivered"
        );
        Ok(())
    }

    pub async fn upload_file(
        &self,
        session: &ConnectedSession,
        payload: UploadFilePayload,
    ) -> Result<(), BrokerError> {
        let size = payload.declared_size();
        self.check_size(session, "file", size)?;
        self.require_room(session, payload.chat_id).await?;
        let body = payload.normalize()?;

        let message = self
            .messages
            .create(&body.into_new_message(payload.chat_id, session.user_id))
            .await?;

        session.record_file(size);
        self.stats.track_message("file");
        self.deliver(session, &message);
        session.send(ServerEvent::FileUploaded(FileUploadedEvent {
            message_id: message.id,
            chat_id: message.chat_id,
            file_name: payload.file_name,
            file_url: message.file_url.clone(),
            file_size: size,
        }));

        tracing::info!(
            user_id = session.user_id,
            chat_id = message.chat_id,
            message_id = message.id,
            size = size,
            "File delivered"
        );
        Ok(())
    }

    /// Relay a typing indicator. Failures are logged and never reach the client.
    pub async fn typing(&self, session: &ConnectedSession, payload: TypingPayload) {
        let chat_id = payload.chat_id;
        if let Err(error) = self.require_room(session, chat_id).await {
            tracing::debug!(
                user_id = session.user_id,
                chat_id = chat_id,
                error = %error,
                "Typing indicator dropped"
            );
            return;
        }

        let event = ServerEvent::UserTyping(TypingEvent {
            user_id: session.user_id,
            chat_id,
            is_typing: payload.is_typing,
        });
        self.gateway.send_to_room(chat_id, &event, Some(session.id));
    }

    pub async fn mark_as_read(
        &self,
        session: &ConnectedSession,
        payload: MarkAsReadPayload,
    ) -> Result<(), BrokerError> {
        let MarkAsReadPayload { chat_id, message_id } = payload;
        self.require_room(session, chat_id).await?;

        let message = self
            .messages
            .find_by_id(message_id)
            .await?
            .filter(|m| m.chat_id == chat_id)
            .ok_or(BrokerError::MessageNotFound(message_id))?;

        // Senders cannot mark their own messages as read.
        if message.sender_id == session.user_id {
            session.send(ServerEvent::MessageReadAck(MessageReadAckEvent {
                message_id,
                chat_id,
                self_message: true,
                read_at: message.read_at,
            }));
            return Ok(());
        }

        let updated = self
            .messages
            .mark_as_read(message_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => BrokerError::MessageNotFound(message_id),
                other => BrokerError::Store(other),
            })?;

        let event = ServerEvent::MessageRead(MessageReadEvent {
            message_id,
            chat_id,
            read_by: session.user_id,
            read_at: updated.read_at,
        });
        self.gateway.send_to_room(chat_id, &event, None);
        Ok(())
    }

    /// Dual-emit: other room members first, then the sender's own copy.
    fn deliver(&self, sender: &ConnectedSession, message: &Message) {
        for recipient in self.gateway.room_sessions(message.chat_id) {
            if recipient.id == sender.id {
                continue;
            }
            recipient.send(ServerEvent::ReceiveMessage(MessagePayload::for_viewer(
                message,
                recipient.user_id,
            )));
        }

        sender.send(ServerEvent::ReceiveMessage(MessagePayload::for_viewer(
            message,
            sender.user_id,
        )));
    }

    fn check_size(&self, session: &ConnectedSession, kind: &str, size: usize) -> Result<(), BrokerError> {
        if size > self.limits.max_payload_bytes {
            return Err(BrokerError::PayloadTooLarge {
                limit: self.limits.max_payload_bytes,
                size,
            });
        }
        if size > self.limits.payload_warn_bytes {
            tracing::warn!(
                user_id = session.user_id,
                connection_id = %session.id,
                kind = kind,
                size = size,
                "Large chat payload"
            );
        }
        Ok(())
    }

    async fn require_chat(&self, chat_id: i64) -> Result<Chat, BrokerError> {
        self.chats
            .find_by_id(chat_id)
            .await?
            .ok_or(BrokerError::ChatNotFound(chat_id))
    }

    /// Chat must exist and the connection must have joined it
    async fn require_room(&self, session: &ConnectedSession, chat_id: i64) -> Result<Chat, BrokerError> {
        let chat = self.require_chat(chat_id).await?;
        if !self.gateway.is_member(session.id, chat_id) {
            return Err(BrokerError::JoinRequired(chat_id));
        }
        Ok(chat)
    }

    fn report_error(&self, session: &ConnectedSession, event: &str, error: BrokerError) {
        match &error {
            BrokerError::Store(e) => tracing::error!(
                user_id = session.user_id,
                connection_id = %session.id,
                event = event,
                error = %e,
                "Chat event failed"
            ),
            other => tracing::debug!(
                user_id = session.user_id,
                connection_id = %session.id,
                event = event,
                error = %other,
                "Chat event rejected"
            ),
        }

        self.stats.track_error(error.code());
        session.send(ServerEvent::Error(error.to_event(action_for(event))));
    }
}
