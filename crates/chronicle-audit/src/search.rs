//! Cache-backed search over the record store.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::QueryCache;
use crate::entry::LogRecord;
use crate::error::AuditResult;
use crate::filter::{Filter, PageRequest};
use crate::storage::{RecordStore, ScanRequest, SortOrder};

/// One page of search results with pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Records on this page, newest first.
    #[serde(rename = "data")]
    pub records: Vec<LogRecord>,
    /// Matching records across all pages.
    pub total: u64,
    /// Page size that was requested.
    pub per_page: u32,
    /// 1-based page number.
    pub current_page: u32,
    /// Number of the last page (at least 1).
    pub last_page: u32,
}

impl Page {
    /// Assemble a page from scan results.
    #[must_use]
    pub fn new(records: Vec<LogRecord>, total: u64, request: PageRequest) -> Self {
        let pages = total.div_ceil(u64::from(request.per_page.max(1))).max(1);
        Self {
            records,
            total,
            per_page: request.per_page,
            current_page: request.page,
            last_page: u32::try_from(pages).unwrap_or(u32::MAX),
        }
    }

    /// Number of records on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether this page holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Runs filtered searches, consulting the query cache first.
///
/// Page bounds are trusted here; callers validate them.
#[derive(Clone)]
pub struct SearchEngine {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn QueryCache>,
    order: SortOrder,
}

impl SearchEngine {
    /// Create a search engine over a store and cache.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, cache: Arc<dyn QueryCache>) -> Self {
        Self {
            store,
            cache,
            order: SortOrder::default(),
        }
    }

    /// The cache this engine populates.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    /// Return the requested page of records matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails on a cache miss.
    pub async fn search(&self, filter: &Filter, page: PageRequest) -> AuditResult<Arc<Page>> {
        let filter = filter.normalized();
        let key = filter.cache_key(page, self.order);

        if let Some(hit) = self.cache.get(&key) {
            debug!(key = %key, records = hit.len(), "search cache hit");
            return Ok(hit);
        }

        let scanned = self
            .store
            .scan(ScanRequest {
                filter: &filter,
                order: self.order,
                limit: page.limit(),
                offset: page.offset(),
            })
            .await?;

        let result = Arc::new(Page::new(scanned.records, scanned.total, page));
        debug!(
            key = %key,
            records = result.len(),
            total = result.total,
            "search cache miss, page computed"
        );
        self.cache.put(key, Arc::clone(&result));
        Ok(result)
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("cache", &self.cache)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}
