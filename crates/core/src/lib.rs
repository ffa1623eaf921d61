//! Core types and shared functionality for novel-covers.
//!
//! This crate provides:
//! - Cover store with SQLite backend
//! - Expiry rule and clock abstraction
//! - Unified error types
//! - Configuration structures

pub mod clock;
pub mod config;
pub mod error;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use store::{CacheStats, CoverEntry, CoverStore, EXPIRY_WINDOW};
