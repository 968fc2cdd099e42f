//! WebSocket Gateway
//!
//! Registry of live connections and chat rooms. One instance is owned by the
//! application state and shared with the broker and housekeeping.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{Outbound, ServerEvent};
use super::session::ConnectedSession;
use crate::infrastructure::metrics::StatsCollector;

/// WebSocket gateway managing all connections
pub struct Gateway {
    /// Active sessions by connection id
    sessions: DashMap<Uuid, Arc<ConnectedSession>>,
    /// User ID to connection ids (one user can have multiple sockets)
    user_sessions: DashMap<i64, Vec<Uuid>>,
    /// Chat ID to connection ids that joined the room
    rooms: DashMap<i64, HashSet<Uuid>>,
    stats: Arc<StatsCollector>,
}

impl Gateway {
    pub fn new(stats: Arc<StatsCollector>) -> Self {
        Self {
            sessions: DashMap::new(),
            user_sessions: DashMap::new(),
            rooms: DashMap::new(),
            stats,
        }
    }

    /// Register an authenticated connection
    pub fn register_session(
        &self,
        user_id: i64,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> Arc<ConnectedSession> {
        let session = Arc::new(ConnectedSession::new(user_id, sender));

        self.sessions.insert(session.id, session.clone());
        self.user_sessions
            .entry(user_id)
            .or_default()
            .push(session.id);
        self.stats.track_connection();

        tracing::info!(
            user_id = user_id,
            connection_id = %session.id,
            "Session registered"
        );

        session
    }

    /// Remove a connection and all of its room memberships.
    ///
    /// Returns `None` if the connection was already gone, so callers racing
    /// on the same connection only count the disconnect once.
    pub fn unregister_session(&self, session_id: Uuid) -> Option<Arc<ConnectedSession>> {
        let (_, session) = self.sessions.remove(&session_id)?;

        let now_empty = match self.user_sessions.get_mut(&session.user_id) {
            Some(mut ids) => {
                ids.retain(|id| *id != session_id);
                ids.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.user_sessions
                .remove_if(&session.user_id, |_, ids| ids.is_empty());
        }

        for chat_id in session.rooms() {
            self.remove_from_room(chat_id, session_id);
        }

        self.stats.track_disconnection();

        tracing::info!(
            user_id = session.user_id,
            connection_id = %session_id,
            "Session unregistered"
        );

        Some(session)
    }

    /// Force a connection closed and unregister it
    pub fn disconnect(&self, session_id: Uuid, reason: &str) -> Option<Arc<ConnectedSession>> {
        let session = self.unregister_session(session_id)?;
        session.close(reason);
        Some(session)
    }

    pub fn get_session(&self, session_id: Uuid) -> Option<Arc<ConnectedSession>> {
        self.sessions.get(&session_id).map(|s| s.value().clone())
    }

    /// Snapshot of all live sessions
    pub fn sessions(&self) -> Vec<Arc<ConnectedSession>> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Add a connection to a chat room. Returns false if it was already a member.
    pub fn join_room(&self, session: &ConnectedSession, chat_id: i64) -> bool {
        if !self.sessions.contains_key(&session.id) {
            return false;
        }
        session.add_room(chat_id);
        let added = self.rooms.entry(chat_id).or_default().insert(session.id);

        // An unregister that ran between the check and the insert may have
        // missed this room; undo the membership ourselves.
        if !self.sessions.contains_key(&session.id) {
            session.remove_room(chat_id);
            self.remove_from_room(chat_id, session.id);
            return false;
        }
        added
    }

    /// Remove a connection from a chat room. Returns false if it was not a member.
    pub fn leave_room(&self, session: &ConnectedSession, chat_id: i64) -> bool {
        session.remove_room(chat_id);
        self.remove_from_room(chat_id, session.id)
    }

    fn remove_from_room(&self, chat_id: i64, session_id: Uuid) -> bool {
        let removed = match self.rooms.get_mut(&chat_id) {
            Some(mut members) => members.remove(&session_id),
            None => false,
        };
        self.rooms.remove_if(&chat_id, |_, members| members.is_empty());
        removed
    }

    /// Check if a connection has joined a room
    pub fn is_member(&self, session_id: Uuid, chat_id: i64) -> bool {
        self.rooms
            .get(&chat_id)
            .map(|members| members.contains(&session_id))
            .unwrap_or(false)
    }

    /// Sessions currently in a room
    pub fn room_sessions(&self, chat_id: i64) -> Vec<Arc<ConnectedSession>> {
        // Copy the ids out first so no room shard lock is held while
        // touching the sessions map.
        let ids: Vec<Uuid> = match self.rooms.get(&chat_id) {
            Some(members) => members.iter().copied().collect(),
            None => return Vec::new(),
        };

        ids.into_iter()
            .filter_map(|id| self.get_session(id))
            .collect()
    }

    /// Send an event to every session in a room, optionally skipping one.
    /// Returns the number of sessions the event was queued for.
    pub fn send_to_room(&self, chat_id: i64, event: &ServerEvent, except: Option<Uuid>) -> usize {
        self.room_sessions(chat_id)
            .into_iter()
            .filter(|session| Some(session.id) != except)
            .filter(|session| session.send(event.clone()))
            .count()
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of rooms with at least one member
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Check if user is online (has at least one session)
    pub fn is_user_online(&self, user_id: i64) -> bool {
        self.user_sessions
            .get(&user_id)
            .map(|sessions| !sessions.is_empty())
            .unwrap_or(false)
    }
}
