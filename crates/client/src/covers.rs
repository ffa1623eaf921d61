//! Cover image cache.
//!
//! [`CoverCache`] maps an image URL to a self-contained data URI, preferring
//! a stored copy over a new download. The store is a strict cache: losing it
//! never loses data, and every read path degrades to the original URL.
//!
//! ### Lifecycle
//! `Uninitialized -> Initializing -> Ready | Failed`. The store is opened on
//! first use (or by [`CoverCache::init`]). Concurrent callers share the one
//! in-flight open. A failed open is remembered and never retried.
//!
//! ### Expiry
//! Checked lazily on read. A stale row is dropped in the background and the
//! lookup proceeds as a miss.
//!
//! Two concurrent misses for the same URL both download; the later write wins.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use novel_covers_core::{AppConfig, CacheStats, Clock, CoverEntry, CoverStore, Error, SystemClock};
use tokio::sync::OnceCell;

use crate::encode::encode_data_url;
use crate::fetch::{CoverFetcher, FetchConfig, HttpFetcher};

/// Where the backing store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// SQLite file on disk.
    Path(PathBuf),
    /// Process-local store, gone on drop.
    InMemory,
}

/// Observable initialization state of a [`CoverCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// Outcome of a cover lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCover {
    /// A `data:` URI, or the source URL when `fallback` is set.
    pub cover: String,
    /// True when caching failed and `cover` is the source URL.
    pub fallback: bool,
}

/// Clears the in-progress flag if the opening future is dropped before it
/// produces a result.
struct OpenAttempt<'a> {
    started: &'a AtomicBool,
    finished: bool,
}

impl<'a> OpenAttempt<'a> {
    fn begin(started: &'a AtomicBool) -> Self {
        started.store(true, Ordering::Release);
        Self { started, finished: false }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for OpenAttempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.started.store(false, Ordering::Release);
        }
    }
}

/// URL-keyed cover cache with download-on-miss.
pub struct CoverCache {
    location: StoreLocation,
    fetcher: Arc<dyn CoverFetcher>,
    clock: Arc<dyn Clock>,
    store: OnceCell<Result<CoverStore, String>>,
    started: AtomicBool,
}

impl std::fmt::Debug for CoverCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverCache")
            .field("location", &self.location)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CoverCache {
    /// Create a cache; nothing is opened until first use.
    pub fn new(location: StoreLocation, fetcher: Arc<dyn CoverFetcher>) -> Self {
        Self {
            location,
            fetcher,
            clock: Arc::new(SystemClock),
            store: OnceCell::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build a cache backed by `config.db_path` and an HTTP fetcher.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let fetcher = HttpFetcher::new(FetchConfig::from(config))?;
        Ok(Self::new(StoreLocation::Path(config.db_path.clone()), Arc::new(fetcher)))
    }

    pub fn state(&self) -> CacheState {
        match self.store.get() {
            Some(Ok(_)) => CacheState::Ready,
            Some(Err(_)) => CacheState::Failed,
            None if self.started.load(Ordering::Acquire) => CacheState::Initializing,
            None => CacheState::Uninitialized,
        }
    }

    /// Open the store now instead of on first use.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreOpen` if the store cannot be opened, now or on
    /// any earlier attempt.
    pub async fn init(&self) -> Result<(), Error> {
        self.ready().await.map(|_| ())
    }

    async fn ready(&self) -> Result<&CoverStore, Error> {
        let opened = self
            .store
            .get_or_init(|| async {
                let attempt = OpenAttempt::begin(&self.started);
                let result = match &self.location {
                    StoreLocation::Path(path) => CoverStore::open(path).await,
                    StoreLocation::InMemory => CoverStore::open_in_memory().await,
                };
                attempt.finish();
                match result {
                    Ok(store) => {
                        tracing::info!(location = ?self.location, "cover store ready");
                        Ok(store)
                    }
                    Err(e) => {
                        tracing::error!(location = ?self.location, error = %e, "failed to open cover store");
                        Err(e.to_string())
                    }
                }
            })
            .await;

        opened.as_ref().map_err(|msg| Error::StoreOpen(msg.clone()))
    }

    /// Resolve `url` to something displayable.
    ///
    /// Returns `None` for a missing or empty URL without touching the store.
    /// Otherwise returns the cached or freshly downloaded data URI, or the
    /// URL itself if anything fails along the way.
    pub async fn get_cover(&self, url: Option<&str>) -> Option<String> {
        self.resolve_cover(url).await.map(|resolved| resolved.cover)
    }

    /// Like [`CoverCache::get_cover`], but reports whether the result is the
    /// degraded source-URL fallback.
    pub async fn resolve_cover(&self, url: Option<&str>) -> Option<ResolvedCover> {
        let url = url.filter(|u| !u.is_empty())?;

        match self.lookup_or_fetch(url).await {
            Ok(data_url) => Some(ResolvedCover { cover: data_url, fallback: false }),
            Err(e) => {
                tracing::warn!(url, error = %e, "cover cache unavailable, using source URL");
                Some(ResolvedCover { cover: url.to_string(), fallback: true })
            }
        }
    }

    async fn lookup_or_fetch(&self, url: &str) -> Result<String, Error> {
        let store = self.ready().await?;
        let now = self.clock.now_millis();

        match store.get_entry(url).await {
            Ok(Some(entry)) if entry.is_fresh(now) => {
                tracing::debug!(url, "cover cache hit");
                return Ok(entry.data_url);
            }
            Ok(Some(entry)) => {
                tracing::debug!(url, stored_at = entry.timestamp, "cover cache entry expired");
                evict_in_background(store.clone(), entry);
            }
            Ok(None) => tracing::debug!(url, "cover cache miss"),
            Err(e) => tracing::warn!(url, error = %e, "cover lookup failed, treating as miss"),
        }

        let image = self.fetcher.fetch(url).await?;
        let data_url = encode_data_url(image).await?;

        let entry = CoverEntry::new(url, data_url, self.clock.now_millis());
        if let Err(e) = store.put_entry(&entry).await {
            tracing::warn!(url, error = %e, "failed to persist cover");
        }

        Ok(entry.data_url)
    }

    /// Store an already-encoded cover under `url`, replacing any prior entry.
    ///
    /// Failures are logged, never returned.
    pub async fn save_base64(&self, url: &str, data: &str) {
        if let Err(e) = self.try_save(url, data).await {
            tracing::warn!(url, error = %e, "failed to save cover");
        }
    }

    async fn try_save(&self, url: &str, data: &str) -> Result<(), Error> {
        if url.is_empty() {
            return Err(Error::InvalidInput("url cannot be empty".into()));
        }
        let store = self.ready().await?;
        store
            .put_entry(&CoverEntry::new(url, data, self.clock.now_millis()))
            .await
    }

    /// Remove every cached cover.
    pub async fn clear_all(&self) -> Result<(), Error> {
        let deleted = self.ready().await?.clear().await?;
        tracing::info!(deleted, "cleared cover cache");
        Ok(())
    }

    /// Entry count and store identifiers.
    pub async fn get_stats(&self) -> Result<CacheStats, Error> {
        self.ready().await?.stats().await
    }

    /// Drop every entry that is already stale.
    ///
    /// Only runs when called; lookups never sweep.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = self.clock.now_millis();
        let deleted = self.ready().await?.purge_expired(now).await?;
        tracing::info!(deleted, "purged expired covers");
        Ok(deleted)
    }

    /// Drop the entry for `url`. Returns true if one existed.
    pub async fn remove(&self, url: &str) -> Result<bool, Error> {
        self.ready().await?.delete_entry(url).await
    }
}

fn evict_in_background(store: CoverStore, entry: CoverEntry) {
    tokio::spawn(async move {
        if let Err(e) = store.delete_stale_entry(&entry.url, entry.timestamp).await {
            tracing::debug!(url = %entry.url, error = %e, "failed to evict expired cover");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchedImage;
    use async_trait::async_trait;
    use novel_covers_core::EXPIRY_WINDOW;
    use std::sync::atomic::{AtomicI64, AtomicUsize};

    const T: i64 = 1_700_000_000_000;
    const COVER_URL: &str = "https://x/cover.jpg";

    #[derive(Default)]
    struct FakeFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeFetcher {
        fn failing() -> Self {
            Self { fail: true, ..Default::default() }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CoverFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedImage, Error> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::HttpError("status 404".into()));
            }
            Ok(FetchedImage::new("image/jpeg", format!("{url}#{n}").into_bytes()))
        }
    }

    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn at(ms: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(ms)))
        }

        fn set(&self, ms: i64) {
            self.0.store(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn window_ms() -> i64 {
        EXPIRY_WINDOW.as_millis() as i64
    }

    fn make_cache(fetcher: Arc<FakeFetcher>, clock: Arc<ManualClock>) -> CoverCache {
        CoverCache::new(StoreLocation::InMemory, fetcher).with_clock(clock)
    }

    async fn wait_for_count(cache: &CoverCache, expected: u64) -> u64 {
        let mut count = cache.get_stats().await.unwrap().count;
        for _ in 0..50 {
            if count == expected {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            count = cache.get_stats().await.unwrap().count;
        }
        count
    }

    /// Cache over an on-disk store plus a second raw connection to the same file.
    async fn file_cache(
        dir: &tempfile::TempDir, fetcher: Arc<FakeFetcher>,
    ) -> (CoverCache, tokio_rusqlite::Connection) {
        let path = dir.path().join("covers.sqlite");
        let cache = CoverCache::new(StoreLocation::Path(path.clone()), fetcher).with_clock(ManualClock::at(T));
        cache.init().await.unwrap();
        let raw = tokio_rusqlite::Connection::open(&path).await.unwrap();
        (cache, raw)
    }

    fn broken_location() -> StoreLocation {
        StoreLocation::Path(PathBuf::from("/nonexistent-dir/for/covers/db.sqlite"))
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = make_cache(fetcher.clone(), ManualClock::at(T));

        let first = cache.get_cover(Some(COVER_URL)).await.unwrap();
        assert!(first.starts_with("data:image/jpeg;base64,"));

        let second = cache.get_cover(Some(COVER_URL)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_hit_just_inside_window() {
        let fetcher = Arc::new(FakeFetcher::default());
        let clock = ManualClock::at(T);
        let cache = make_cache(fetcher.clone(), clock.clone());

        cache.save_base64(COVER_URL, "data:image/png;base64,AAAA").await;
        clock.set(T + window_ms() - 1);

        let cover = cache.get_cover(Some(COVER_URL)).await.unwrap();
        assert_eq!(cover, "data:image/png;base64,AAAA");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_just_past_window() {
        let fetcher = Arc::new(FakeFetcher::default());
        let clock = ManualClock::at(T);
        let cache = make_cache(fetcher.clone(), clock.clone());

        cache.save_base64(COVER_URL, "data:image/png;base64,AAAA").await;
        clock.set(T + window_ms() + 1);

        let cover = cache.get_cover(Some(COVER_URL)).await.unwrap();
        assert_ne!(cover, "data:image/png;base64,AAAA");
        assert!(cover.starts_with("data:image/jpeg;base64,"));
        assert_eq!(fetcher.calls(), 1);

        let again = cache.get_cover(Some(COVER_URL)).await.unwrap();
        assert_eq!(again, cover);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_save_then_get_skips_fetch() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = make_cache(fetcher.clone(), ManualClock::at(T));

        cache.save_base64(COVER_URL, "data:image/gif;base64,R0lG").await;

        assert_eq!(cache.get_cover(Some(COVER_URL)).await.as_deref(), Some("data:image/gif;base64,R0lG"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_save_overwrites_fetched_entry() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = make_cache(fetcher.clone(), ManualClock::at(T));

        cache.get_cover(Some(COVER_URL)).await.unwrap();
        cache.save_base64(COVER_URL, "data:manual").await;

        assert_eq!(cache.get_cover(Some(COVER_URL)).await.as_deref(), Some("data:manual"));
        assert_eq!(cache.get_stats().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_clear_all_then_stats() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = make_cache(fetcher, ManualClock::at(T));

        cache.get_cover(Some("https://x/a.jpg")).await;
        cache.get_cover(Some("https://x/b.jpg")).await;
        assert_eq!(cache.get_stats().await.unwrap().count, 2);

        cache.clear_all().await.unwrap();

        let stats = cache.get_stats().await.unwrap();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.db_name, "NovelCoversDB");
        assert_eq!(stats.store_name, "covers");
    }

    #[tokio::test]
    async fn test_missing_url_does_not_touch_store() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = make_cache(fetcher.clone(), ManualClock::at(T));

        assert_eq!(cache.get_cover(None).await, None);
        assert_eq!(cache.get_cover(Some("")).await, None);
        assert_eq!(cache.state(), CacheState::Uninitialized);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_url() {
        let fetcher = Arc::new(FakeFetcher::failing());
        let cache = make_cache(fetcher.clone(), ManualClock::at(T));

        assert_eq!(cache.get_cover(Some(COVER_URL)).await.as_deref(), Some(COVER_URL));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(cache.get_stats().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_lifecycle_ready() {
        let cache = make_cache(Arc::new(FakeFetcher::default()), ManualClock::at(T));
        assert_eq!(cache.state(), CacheState::Uninitialized);

        cache.init().await.unwrap();
        assert_eq!(cache.state(), CacheState::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_store() {
        let cache = make_cache(Arc::new(FakeFetcher::default()), ManualClock::at(T));

        let ((), opened, stats) = tokio::join!(cache.save_base64(COVER_URL, "data:x"), cache.init(), cache.get_stats());
        opened.unwrap();
        stats.unwrap();

        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.get_stats().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_open_failure_is_sticky() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = CoverCache::new(broken_location(), fetcher.clone());

        let first = cache.init().await;
        assert!(matches!(first, Err(Error::StoreOpen(_))));
        assert_eq!(cache.state(), CacheState::Failed);

        assert!(matches!(cache.clear_all().await, Err(Error::StoreOpen(_))));
        assert!(matches!(cache.get_stats().await, Err(Error::StoreOpen(_))));

        match (first, cache.init().await) {
            (Err(Error::StoreOpen(a)), Err(Error::StoreOpen(b))) => assert_eq!(a, b),
            other => panic!("expected sticky StoreOpen, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_open_failure_degrades_get_cover() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = CoverCache::new(broken_location(), fetcher.clone());

        assert_eq!(cache.get_cover(Some(COVER_URL)).await.as_deref(), Some(COVER_URL));
        cache.save_base64(COVER_URL, "data:x").await;
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired_and_remove() {
        let clock = ManualClock::at(T);
        let cache = make_cache(Arc::new(FakeFetcher::default()), clock.clone());

        cache.save_base64("https://x/old.jpg", "data:old").await;
        clock.set(T + 10);
        cache.save_base64("https://x/new.jpg", "data:new").await;

        clock.set(T + window_ms());
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.get_stats().await.unwrap().count, 1);

        assert!(cache.remove("https://x/new.jpg").await.unwrap());
        assert!(!cache.remove("https://x/new.jpg").await.unwrap());
        assert_eq!(cache.get_stats().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_expired_entry_removed_even_when_refetch_fails() {
        let fetcher = Arc::new(FakeFetcher::failing());
        let clock = ManualClock::at(T);
        let cache = make_cache(fetcher.clone(), clock.clone());

        cache.save_base64(COVER_URL, "data:image/png;base64,AAAA").await;
        clock.set(T + window_ms() + 1);

        assert_eq!(cache.get_cover(Some(COVER_URL)).await.as_deref(), Some(COVER_URL));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(wait_for_count(&cache, 0).await, 0);
    }

    #[tokio::test]
    async fn test_resolve_cover_reports_fallback() {
        let cache = make_cache(Arc::new(FakeFetcher::failing()), ManualClock::at(T));
        let resolved = cache.resolve_cover(Some(COVER_URL)).await.unwrap();
        assert!(resolved.fallback);
        assert_eq!(resolved.cover, COVER_URL);
    }

    #[tokio::test]
    async fn test_resolve_cover_saved_value_equal_to_key_is_not_fallback() {
        let fetcher = Arc::new(FakeFetcher::failing());
        let cache = make_cache(fetcher.clone(), ManualClock::at(T));
        let key = "data:image/png;base64,AAAA";

        cache.save_base64(key, key).await;

        let resolved = cache.resolve_cover(Some(key)).await.unwrap();
        assert_eq!(resolved, ResolvedCover { cover: key.to_string(), fallback: false });
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_still_returns_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let (cache, raw) = file_cache(&dir, fetcher.clone()).await;

        raw.call(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_covers BEFORE INSERT ON covers
                 BEGIN SELECT RAISE(ABORT, 'read only'); END;",
            )
        })
        .await
        .unwrap();

        let cover = cache.get_cover(Some(COVER_URL)).await.unwrap();
        assert!(cover.starts_with("data:image/jpeg;base64,"));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(cache.get_stats().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_treated_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let (cache, raw) = file_cache(&dir, fetcher.clone()).await;

        raw.call(|conn| conn.execute_batch("ALTER TABLE covers RENAME TO covers_moved;"))
            .await
            .unwrap();

        let resolved = cache.resolve_cover(Some(COVER_URL)).await.unwrap();
        assert!(!resolved.fallback);
        assert!(resolved.cover.starts_with("data:image/jpeg;base64,"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_dropped_open_does_not_stay_initializing() {
        use std::task::Poll;

        let cache = make_cache(Arc::new(FakeFetcher::default()), ManualClock::at(T));

        let mut init = Box::pin(cache.init());
        let first = std::future::poll_fn(|cx| Poll::Ready(init.as_mut().poll(cx))).await;
        match first {
            Poll::Pending => {
                assert_eq!(cache.state(), CacheState::Initializing);
                drop(init);
                assert_eq!(cache.state(), CacheState::Uninitialized);
            }
            Poll::Ready(result) => {
                result.unwrap();
                drop(init);
            }
        }

        cache.init().await.unwrap();
        assert_eq!(cache.state(), CacheState::Ready);
    }
}
