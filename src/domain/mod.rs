//! # Domain Layer
//!
//! Entities and repository contracts for chats and messages.
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts

pub mod entities;

pub use entities::*;
