//! Cover cache MCP tools.
//!
//! Thin wrappers over [`novel_covers_client::CoverCache`].

pub mod get;
pub mod maintenance;
pub mod save;

pub use get::{CoverGetParams, get_impl};
pub use maintenance::{clear_impl, purge_impl, stats_impl};
pub use save::{CoverSaveParams, save_impl};
