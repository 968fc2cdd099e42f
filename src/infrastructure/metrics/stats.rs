//! Gateway Stats Collector
//!
//! Process-wide connection, message and error counters. Every component
//! reports into one shared [`StatsCollector`]; the periodic reporter and the
//! readiness endpoint read snapshots from it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;

/// Coarse classification of the current connection load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionHealth {
    /// No connections
    Idle,
    /// Fewer than 50 connections
    Healthy,
    /// Fewer than 200 connections
    Busy,
    /// 200 connections or more
    Overloaded,
}

impl ConnectionHealth {
    pub fn classify(active_connections: u64) -> Self {
        match active_connections {
            0 => Self::Idle,
            1..=49 => Self::Healthy,
            50..=199 => Self::Busy,
            _ => Self::Overloaded,
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub peak_connections: u64,
    pub total_messages: u64,
    pub total_errors: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
}

/// Outcome of one periodic report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReport {
    pub snapshot: StatsSnapshot,
    pub health: ConnectionHealth,
    /// Active connections exceeded the warning threshold
    pub connection_warning: bool,
}

/// Process-wide gateway counters
#[derive(Debug)]
pub struct StatsCollector {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    peak_connections: AtomicU64,
    total_messages: AtomicU64,
    total_errors: AtomicU64,
    started_at: RwLock<DateTime<Utc>>,
    connection_warning_threshold: u64,
}

impl StatsCollector {
    pub fn new(connection_warning_threshold: u64) -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            peak_connections: AtomicU64::new(0),
            total_messages: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            started_at: RwLock::new(Utc::now()),
            connection_warning_threshold,
        }
    }

    /// Record a newly authenticated connection
    pub fn track_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        let active = self.active_connections.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_connections.fetch_max(active, Ordering::AcqRel);
        super::set_websocket_connections(active);
    }

    /// Record a closed connection
    pub fn track_disconnection(&self) {
        let previous = self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        super::set_websocket_connections(previous.saturating_sub(1));
    }

    /// Record a delivered message or file (`kind` is "message" or "file")
    pub fn track_message(&self, kind: &str) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
        super::record_chat_event(kind);
    }

    /// Record an error reported to a client
    pub fn track_error(&self, code: &str) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        super::record_chat_error(code);
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Acquire)
    }

    pub fn connection_health(&self) -> ConnectionHealth {
        ConnectionHealth::classify(self.active_connections())
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let started_at = *self.started_at.read();
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections(),
            peak_connections: self.peak_connections.load(Ordering::Acquire),
            total_messages: self.total_messages.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            started_at,
            uptime_seconds: (Utc::now() - started_at).num_seconds(),
        }
    }

    /// Reset the cumulative counters and restart the uptime clock.
    ///
    /// Active connections are live state and are kept; the peak restarts
    /// from the current active count.
    pub fn reset(&self) {
        let active = self.active_connections();
        self.total_connections.store(active, Ordering::Relaxed);
        self.peak_connections.store(active, Ordering::Release);
        self.total_messages.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
        *self.started_at.write() = Utc::now();
        tracing::info!("Gateway stats reset");
    }

    /// Log the current snapshot, warning when the connection count is high
    pub fn report(&self) -> StatsReport {
        let snapshot = self.snapshot();
        let health = ConnectionHealth::classify(snapshot.active_connections);
        let connection_warning = snapshot.active_connections > self.connection_warning_threshold;

        tracing::info!(
            total_connections = snapshot.total_connections,
            active_connections = snapshot.active_connections,
            peak_connections = snapshot.peak_connections,
            total_messages = snapshot.total_messages,
            total_errors = snapshot.total_errors,
            uptime_seconds = snapshot.uptime_seconds,
            health = ?health,
            "Gateway stats"
        );

        if connection_warning {
            tracing::warn!(
                active_connections = snapshot.active_connections,
                threshold = self.connection_warning_threshold,
                "High number of active connections"
            );
        }

        StatsReport {
            snapshot,
            health,
            connection_warning,
        }
    }

    /// Spawn the periodic stats reporter
    pub fn spawn_reporter(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // Skip first immediate tick

            loop {
                ticker.tick().await;
                self.report();
            }
        })
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new(1000)
    }
}
