//! Time-bounded memoization of search pages.
//!
//! Entries are never invalidated on write. A search issued right after a
//! write may be served a page that predates it; once the TTL has elapsed the
//! entry reads as a miss and the next search recomputes it. Expiry is
//! checked lazily on [`get`](QueryCache::get).

use std::sync::Arc;

use chrono::Duration;
use chronicle_core::{Clock, Timestamp};
use dashmap::DashMap;
use tracing::trace;

use crate::filter::CacheKey;
use crate::search::Page;

/// Default time-to-live for cached pages (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// A cached page and the time it was computed.
///
/// Entries are immutable: a recomputation replaces the entry wholesale.
#[derive(Debug)]
pub struct CacheEntry {
    /// The cached page.
    pub page: Arc<Page>,
    /// When the page was stored.
    pub created_at: Timestamp,
}

/// Cache of search pages keyed by [`CacheKey`].
///
/// Implementations synchronize internally. Concurrent `put`s on the same key
/// resolve last-write-wins and a reader only ever sees a complete page.
pub trait QueryCache: Send + Sync + std::fmt::Debug {
    /// Look up a fresh page.
    fn get(&self, key: &CacheKey) -> Option<Arc<Page>>;

    /// Store a page under `key`, replacing any existing entry.
    fn put(&self, key: CacheKey, page: Arc<Page>);

    /// Number of entries held, including expired ones not yet purged.
    fn len(&self) -> usize;

    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed.
    fn purge_expired(&self) -> usize;
}

/// [`QueryCache`] with a fixed time-to-live.
#[derive(Debug)]
pub struct TtlQueryCache {
    entries: DashMap<CacheKey, Arc<CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlQueryCache {
    /// Create a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
            clock,
        }
    }

    /// Create a cache with the default TTL.
    #[must_use]
    pub fn with_default_ttl(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            std::time::Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            clock,
        )
    }

    /// The configured time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Timestamp) -> bool {
        entry
            .created_at
            .checked_add(self.ttl)
            .is_none_or(|expires_at| now < expires_at)
    }
}

impl QueryCache for TtlQueryCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<Page>> {
        // Clone the entry out so the shard guard is released before any removal.
        let entry = self.entries.get(key).map(|e| Arc::clone(e.value()))?;
        let now = self.clock.now();
        if self.is_fresh(&entry, now) {
            return Some(Arc::clone(&entry.page));
        }
        self.entries
            .remove_if(key, |_, current| !self.is_fresh(current, now));
        trace!(key = %key, "expired cache entry evicted");
        None
    }

    fn put(&self, key: CacheKey, page: Arc<Page>) {
        let entry = CacheEntry {
            page,
            created_at: self.clock.now(),
        };
        self.entries.insert(key, Arc::new(entry));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_fresh(entry, now));
        before.saturating_sub(self.entries.len())
    }
}

/// [`QueryCache`] that stores nothing. Every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledQueryCache;

impl QueryCache for DisabledQueryCache {
    fn get(&self, _key: &CacheKey) -> Option<Arc<Page>> {
        None
    }

    fn put(&self, _key: CacheKey, _page: Arc<Page>) {}

    fn len(&self) -> usize {
        0
    }

    fn purge_expired(&self) -> usize {
        0
    }
}
