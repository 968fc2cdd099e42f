//! HTTP Handlers
//!
//! Operational endpoints; chat traffic goes through the WebSocket gateway.

pub mod health;
