//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Prometheus metrics and gateway stats
//! - Process memory probing

pub mod database;
pub mod memory;
pub mod metrics;
pub mod repositories;
