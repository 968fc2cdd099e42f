//! Middleware
//!
//! Handshake authentication and Tower layers for request processing.

pub mod auth;
pub mod cors;
pub mod logging;

pub use auth::{verify_token, AuthUser, Claims};
