//! Message Repository Implementation
//!
//! PostgreSQL implementation of the message store used by the chat broker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{resolve_file_url, Message, MessageRepository, MessageType, NewMessage};
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    chat_id: i64,
    sender_id: i64,
    message_type: String,
    content: Option<String>,
    file_url: Option<String>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        let message_type = MessageType::parse(&self.message_type).unwrap_or_else(|| {
            tracing::warn!(
                message_id = self.id,
                message_type = %self.message_type,
                "Unknown message type in store, treating as text"
            );
            MessageType::Text
        });

        Message {
            id: self.id,
            chat_id: self.chat_id,
            sender_id: self.sender_id,
            message_type,
            content: self.content,
            file_url: self.file_url,
            read_at: self.read_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// Ids are cast to BIGINT because the consultation schema uses INTEGER keys.
const MESSAGE_COLUMNS: &str = r#"
    id::bigint AS id, chat_id::bigint AS chat_id, sender_id::bigint AS sender_id,
    message_type::text AS message_type, content, file_url, read_at, created_at, updated_at
"#;

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let query = format!("SELECT {} FROM messages WHERE id = $1", MESSAGE_COLUMNS);
        let row = sqlx::query_as::<_, MessageRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(MessageRow::into_message))
    }

    /// Returns one page of history in chronological order.
    ///
    /// The page is selected newest-first so page 1 is always the latest
    /// conversation, then reversed for display.
    async fn find_by_chat(
        &self,
        chat_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);

        let query = format!(
            "SELECT {} FROM messages WHERE chat_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, MessageRow>(&query)
            .bind(chat_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut messages: Vec<Message> = rows.into_iter().map(MessageRow::into_message).collect();
        messages.reverse();
        Ok(messages)
    }

    async fn create(&self, message: &NewMessage) -> Result<Message, AppError> {
        let file_url = message.file_ref.as_deref().map(resolve_file_url);

        let query = format!(
            r#"
            INSERT INTO messages (chat_id, sender_id, message_type, content, file_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        );
        let row = sqlx::query_as::<_, MessageRow>(&query)
            .bind(message.chat_id)
            .bind(message.sender_id)
            .bind(message.message_type.as_str())
            .bind(&message.content)
            .bind(file_url)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into_message())
    }

    async fn mark_as_read(&self, id: i64) -> Result<Message, AppError> {
        let query = format!(
            r#"
            UPDATE messages
            SET read_at = COALESCE(read_at, NOW()), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        );
        let row = sqlx::query_as::<_, MessageRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?;

        Ok(row.into_message())
    }
}
