//! WebSocket Session Management
//!
//! Per-connection state: the authenticated principal, joined rooms and the
//! activity counters the housekeeping sweep uses for eviction.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{Outbound, ServerEvent};

/// Activity bookkeeping for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionActivity {
    pub last_activity: DateTime<Utc>,
    pub messages_sent: u64,
    pub files_uploaded: u64,
    pub bytes_sent: u64,
}

impl SessionActivity {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_activity: now,
            messages_sent: 0,
            files_uploaded: 0,
            bytes_sent: 0,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn record_message(&mut self, bytes: usize, now: DateTime<Utc>) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
        self.touch(now);
    }

    pub fn record_file(&mut self, bytes: usize, now: DateTime<Utc>) {
        self.files_uploaded += 1;
        self.bytes_sent += bytes as u64;
        self.touch(now);
    }

    /// Time since the last inbound event; zero if `now` is in the past
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).to_std().unwrap_or_default()
    }
}

/// An authenticated, registered WebSocket connection
#[derive(Debug)]
pub struct ConnectedSession {
    pub id: Uuid,
    /// Principal from the verified handshake token
    pub user_id: i64,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<Outbound>,
    rooms: Mutex<HashSet<i64>>,
    activity: Mutex<SessionActivity>,
}

impl ConnectedSession {
    pub fn new(user_id: i64, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            connected_at: now,
            sender,
            rooms: Mutex::new(HashSet::new()),
            activity: Mutex::new(SessionActivity::new(now)),
        }
    }

    /// Queue an event for this connection. Returns false if the socket is gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(Outbound::Event(event)).is_ok()
    }

    /// Ask the socket task to close the connection
    pub fn close(&self, reason: impl Into<String>) {
        let _ = self.sender.send(Outbound::Close {
            reason: reason.into(),
        });
    }

    pub fn touch(&self) {
        self.touch_at(Utc::now());
    }

    /// Set the last-activity timestamp explicitly
    pub fn touch_at(&self, now: DateTime<Utc>) {
        self.activity.lock().touch(now);
    }

    pub fn record_message(&self, bytes: usize) {
        self.activity.lock().record_message(bytes, Utc::now());
    }

    pub fn record_file(&self, bytes: usize) {
        self.activity.lock().record_file(bytes, Utc::now());
    }

    pub fn activity(&self) -> SessionActivity {
        self.activity.lock().clone()
    }

    pub fn rooms(&self) -> Vec<i64> {
        self.rooms.lock().iter().copied().collect()
    }

    pub(super) fn add_room(&self, chat_id: i64) -> bool {
        self.rooms.lock().insert(chat_id)
    }

    pub(super) fn remove_room(&self, chat_id: i64) -> bool {
        self.rooms.lock().remove(&chat_id)
    }
}
