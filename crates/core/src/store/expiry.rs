//! Freshness rule shared by lookups and sweeps.

use std::time::Duration;

/// How long a stored cover stays valid.
pub const EXPIRY_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// [`EXPIRY_WINDOW`] in milliseconds, matching stored timestamps.
pub const EXPIRY_WINDOW_MS: i64 = EXPIRY_WINDOW.as_millis() as i64;

/// An entry written at `stored_at_ms` is valid iff `now - stored_at < window`.
pub fn is_fresh(stored_at_ms: i64, now_ms: i64) -> bool {
    now_ms.saturating_sub(stored_at_ms) < EXPIRY_WINDOW_MS
}

/// Newest timestamp that is already stale at `now_ms`.
pub(crate) fn stale_cutoff(now_ms: i64) -> i64 {
    now_ms.saturating_sub(EXPIRY_WINDOW_MS)
}
