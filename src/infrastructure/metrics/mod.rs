//! Prometheus Metrics Module
//!
//! Provides gateway-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Active WebSocket connection gauge
//! - Chat messages and file uploads delivered
//! - Errors reported to clients, by error code
//! - Connections evicted by housekeeping
//! - Resident memory observed by the memory sweep

pub mod stats;

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub use stats::{ConnectionHealth, StatsCollector, StatsReport, StatsSnapshot};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket connections gauge
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "websocket_connections_active",
            "Number of authenticated WebSocket connections",
        )
        .namespace("clinic_chat"),
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Delivered chat events by kind ("message", "file")
pub static CHAT_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chat_events_total", "Total chat messages and files delivered")
            .namespace("clinic_chat"),
        &["kind"],
    )
    .expect("Failed to create CHAT_EVENTS_TOTAL metric")
});

/// Errors emitted to clients by error code
pub static CHAT_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chat_errors_total", "Total errors reported to chat clients")
            .namespace("clinic_chat"),
        &["code"],
    )
    .expect("Failed to create CHAT_ERRORS_TOTAL metric")
});

/// Connections evicted for inactivity
pub static CONNECTIONS_EVICTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "connections_evicted_total",
            "Total connections closed by the inactivity sweep",
        )
        .namespace("clinic_chat"),
    )
    .expect("Failed to create CONNECTIONS_EVICTED_TOTAL metric")
});

/// Resident memory as last sampled by the memory sweep
pub static PROCESS_RESIDENT_MEMORY_BYTES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "process_resident_memory_bytes",
            "Resident memory observed by the memory sweep",
        )
        .namespace("clinic_chat"),
    )
    .expect("Failed to create PROCESS_RESIDENT_MEMORY_BYTES metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(CHAT_EVENTS_TOTAL.clone()))
        .expect("Failed to register CHAT_EVENTS_TOTAL");
    registry
        .register(Box::new(CHAT_ERRORS_TOTAL.clone()))
        .expect("Failed to register CHAT_ERRORS_TOTAL");
    registry
        .register(Box::new(CONNECTIONS_EVICTED_TOTAL.clone()))
        .expect("Failed to register CONNECTIONS_EVICTED_TOTAL");
    registry
        .register(Box::new(PROCESS_RESIDENT_MEMORY_BYTES.clone()))
        .expect("Failed to register PROCESS_RESIDENT_MEMORY_BYTES");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Update the active connection gauge
pub fn set_websocket_connections(active: u64) {
    WEBSOCKET_CONNECTIONS_ACTIVE.set(active as i64);
}

/// Record a delivered chat event
pub fn record_chat_event(kind: &str) {
    CHAT_EVENTS_TOTAL.with_label_values(&[kind]).inc();
}

/// Record an error sent to a client
pub fn record_chat_error(code: &str) {
    CHAT_ERRORS_TOTAL.with_label_values(&[code]).inc();
}

/// Record evicted connections
pub fn record_evictions(count: u64) {
    CONNECTIONS_EVICTED_TOTAL.inc_by(count);
}

/// Update the resident memory gauge
pub fn set_resident_memory(bytes: u64) {
    PROCESS_RESIDENT_MEMORY_BYTES.set(bytes as i64);
}
