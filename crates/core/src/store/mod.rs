//! SQLite-backed store for cover images.
//!
//! One table keyed by source URL, holding a self-contained data URI and the
//! epoch-millisecond timestamp of the last write. Access is async via
//! tokio-rusqlite. It supports:
//!
//! - Upsert semantics (last write wins per URL)
//! - Automatic schema migrations
//! - A timestamp index for explicit expiry sweeps
//!
//! Expiry is never enforced by the store itself; see [`expiry`].

pub mod connection;
pub mod entries;
pub mod expiry;
pub mod migrations;

pub use crate::Error;

pub use connection::CoverStore;
pub use entries::{CacheStats, CoverEntry};
pub use expiry::{EXPIRY_WINDOW, EXPIRY_WINDOW_MS, is_fresh};

/// Logical database name reported by stats.
pub const DB_NAME: &str = "NovelCoversDB";

/// Name of the single collection (table) holding cover entries.
pub const STORE_NAME: &str = "covers";

/// Schema version the store is migrated to.
pub const DB_VERSION: i64 = 1;
