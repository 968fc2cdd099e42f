//! Chat entity and repository trait.
//!
//! A chat is created by the consultation workflow; the gateway only reads it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A consultation-bound conversation between a patient and a doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub consultation_id: Option<i64>,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// Check whether a user takes part in this chat.
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

/// Repository trait for Chat lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Find a chat by its ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError>;
}
