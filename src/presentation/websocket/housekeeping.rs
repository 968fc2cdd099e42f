//! Housekeeping
//!
//! Two independent interval sweeps: evict connections idle past the
//! threshold, and sample process memory against a soft ceiling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::gateway::Gateway;
use crate::config::HousekeepingSettings;
use crate::infrastructure::memory::{MemoryProbe, MemorySample, ReclaimHook};
use crate::infrastructure::metrics;

/// Close reason sent to evicted sockets
pub const IDLE_TIMEOUT_REASON: &str = "idle timeout";

/// Result of one inactive-connection sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: usize,
    /// Bytes the evicted connections had sent over their lifetime
    pub bytes: u64,
}

/// Result of one memory sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReport {
    pub sample: MemorySample,
    pub over_ceiling: bool,
    pub reclaimed: bool,
}

pub struct Housekeeper {
    gateway: Arc<Gateway>,
    settings: HousekeepingSettings,
    probe: Arc<dyn MemoryProbe>,
    reclaim: Option<ReclaimHook>,
}

impl Housekeeper {
    pub fn new(
        gateway: Arc<Gateway>,
        settings: HousekeepingSettings,
        probe: Arc<dyn MemoryProbe>,
    ) -> Self {
        Self {
            gateway,
            settings,
            probe,
            reclaim: None,
        }
    }

    /// Install a hook the memory sweep calls when usage crosses the ceiling
    pub fn with_reclaim_hook(mut self, hook: ReclaimHook) -> Self {
        self.reclaim = Some(hook);
        self
    }

    /// Disconnect every connection idle for longer than the threshold
    pub fn sweep_inactive(&self, now: DateTime<Utc>) -> EvictionReport {
        let threshold = self.settings.inactive_threshold();
        let mut report = EvictionReport::default();

        for session in self.gateway.sessions() {
            let activity = session.activity();
            let idle = activity.idle_for(now);
            if idle <= threshold {
                continue;
            }

            if self.gateway.disconnect(session.id, IDLE_TIMEOUT_REASON).is_some() {
                report.evicted += 1;
                report.bytes += activity.bytes_sent;
                tracing::info!(
                    user_id = session.user_id,
                    connection_id = %session.id,
                    idle_secs = idle.as_secs(),
                    "Evicted idle connection"
                );
            }
        }

        if report.evicted > 0 {
            metrics::record_evictions(report.evicted as u64);
            tracing::info!(
                evicted = report.evicted,
                bytes = report.bytes,
                remaining = self.gateway.session_count(),
                "Inactive connection sweep"
            );
        } else {
            tracing::debug!(
                remaining = self.gateway.session_count(),
                "Inactive connection sweep found nothing to evict"
            );
        }

        report
    }

    /// Sample process memory and warn above the ceiling.
    ///
    /// Returns `None` when the platform offers no reading.
    pub fn sweep_memory(&self) -> Option<MemoryReport> {
        let sample = self.probe.sample()?;
        metrics::set_resident_memory(sample.used_bytes);

        tracing::debug!(
            used_mb = sample.used_mb(),
            total_mb = sample.total_mb(),
            "Memory usage"
        );

        let over_ceiling = sample.used_bytes > self.settings.memory_ceiling_bytes();
        let mut reclaimed = false;

        if over_ceiling {
            tracing::warn!(
                used_mb = sample.used_mb(),
                ceiling_mb = self.settings.memory_ceiling_mb,
                "Memory usage above ceiling"
            );
            if let Some(hook) = &self.reclaim {
                hook();
                reclaimed = true;
                tracing::info!("Memory reclaim hook invoked");
            }
        }

        Some(MemoryReport {
            sample,
            over_ceiling,
            reclaimed,
        })
    }

    /// Spawn both sweeps on their own intervals
    pub fn start(self: Arc<Self>) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::default();

        let inactive = self.clone();
        tasks.push(spawn_interval(
            self.settings.inactive_sweep_interval(),
            move || {
                inactive.sweep_inactive(Utc::now());
            },
        ));

        let memory = self.clone();
        tasks.push(spawn_interval(
            self.settings.memory_sweep_interval(),
            move || {
                memory.sweep_memory();
            },
        ));

        tracing::info!(
            inactive_sweep_secs = self.settings.inactive_sweep_interval_secs,
            inactive_threshold_secs = self.settings.inactive_threshold_secs,
            memory_sweep_secs = self.settings.memory_sweep_interval_secs,
            "Housekeeping started"
        );

        tasks
    }
}

fn spawn_interval<F>(every: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // Skip first immediate tick

        loop {
            ticker.tick().await;
            tick();
        }
    })
}

/// Handles of the background tasks tied to the process lifecycle
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Abort every task
    pub fn stop(self) {
        for handle in &self.handles {
            handle.abort();
        }
        tracing::info!(tasks = self.handles.len(), "Background tasks stopped");
    }
}
