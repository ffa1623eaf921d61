//! Client code for novel-covers.
//!
//! This crate provides the cover image fetcher, data URI encoding, and the
//! [`CoverCache`] that ties them to the persistent store.

pub mod covers;
pub mod encode;
pub mod fetch;

pub use covers::{CacheState, CoverCache, ResolvedCover, StoreLocation};
pub use encode::{encode_data_url, to_data_url};
pub use fetch::{CoverFetcher, FetchConfig, FetchedImage, HttpFetcher};
