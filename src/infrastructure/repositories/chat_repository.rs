//! Chat Repository Implementation
//!
//! Read-only PostgreSQL access to consultation chats.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Chat, ChatRepository};
use crate::shared::error::AppError;

/// PostgreSQL chat repository implementation.
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    /// Creates a new PgChatRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: i64,
    consultation_id: Option<i64>,
    patient_id: i64,
    doctor_id: i64,
    created_at: DateTime<Utc>,
}

impl From<ChatRow> for Chat {
    fn from(row: ChatRow) -> Self {
        Self {
            id: row.id,
            consultation_id: row.consultation_id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id::bigint AS id, consultation_id::bigint AS consultation_id,
                   patient_id::bigint AS patient_id, doctor_id::bigint AS doctor_id,
                   created_at
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Chat::from))
    }
}
