//! Log service - main interface for the audit log.
//!
//! Provides the four inbound operations: create, search, verify and export.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chronicle_config::Config;
use chronicle_core::{Clock, RecordId, SystemClock, Timestamp};
use tracing::{debug, info, warn};

use crate::cache::{DEFAULT_CACHE_TTL_SECS, DisabledQueryCache, QueryCache, TtlQueryCache};
use crate::entry::{LogRecord, NewLogRecord};
use crate::error::{AuditError, AuditResult};
use crate::export::{DEFAULT_EXPORT_PAGE_LIMIT, Export, ExportFormat, ExportStream};
use crate::filter::{DEFAULT_PER_PAGE, Filter, MAX_PER_PAGE, PageRequest};
use crate::search::{Page, SearchEngine};
use crate::storage::{KvRecordStore, RecordStore};

/// Audit log service.
pub struct LogService {
    store: Arc<dyn RecordStore>,
    search: SearchEngine,
    clock: Arc<dyn Clock>,
    /// Last timestamp handed out, so assigned timestamps never go backwards.
    last_assigned: Mutex<Option<Timestamp>>,
    default_per_page: u32,
    max_per_page: u32,
    export_page_limit: u32,
}

impl LogService {
    /// Start building a service.
    #[must_use]
    pub fn builder() -> LogServiceBuilder {
        LogServiceBuilder::default()
    }

    /// Create a service with an in-memory store and default settings.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    /// Default page request for interactive searches.
    #[must_use]
    pub fn default_page(&self) -> PageRequest {
        PageRequest::first(self.default_per_page)
    }

    /// Validate, fingerprint and persist a new record.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required field is blank, or a store
    /// error if the record cannot be persisted.
    pub async fn create_log(&self, submission: NewLogRecord) -> AuditResult<LogRecord> {
        submission.validate()?;

        let now = self.assign_timestamp();
        let sealed = submission.into_body(now).seal();
        let id = self.store.insert(&sealed).await?;

        debug!(
            record_id = %id,
            system = %sealed.body.system,
            action = %sealed.body.action,
            "Appended log record"
        );
        Ok(LogRecord::from_unsaved(id, sealed))
    }

    /// Search records, serving from the query cache when possible.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an inverted date range or an
    /// out-of-bounds page, or a store error on a cache miss.
    pub async fn search_logs(&self, filter: &Filter, page: PageRequest) -> AuditResult<Arc<Page>> {
        let mut violations = filter.violations();
        violations.extend(page.violations(self.max_per_page));
        violations.into_result()?;

        self.search.search(filter, page).await
    }

    /// Fetch a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::NotFound`] if no such record exists.
    pub async fn get_log(&self, id: &RecordId) -> AuditResult<LogRecord> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuditError::NotFound { id: id.to_string() })
    }

    /// Check a stored record against its fingerprint.
    ///
    /// The fingerprint is recomputed over the document as persisted, so
    /// added, removed or retyped fields are caught as well as changed
    /// values. A mismatch, including a document that no longer decodes, is
    /// an expected outcome and is reported as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::NotFound`] if no such record exists, or a store
    /// error if the backend fails.
    pub async fn verify_log(&self, id: &RecordId) -> AuditResult<bool> {
        let document = match self.store.find_document(id).await {
            Ok(Some(document)) => document,
            Ok(None) => return Err(AuditError::NotFound { id: id.to_string() }),
            Err(AuditError::Serialization(reason)) => {
                warn!(record_id = %id, reason = %reason, "Stored log record is unreadable");
                return Ok(false);
            },
            Err(e) => return Err(e),
        };

        let valid = LogRecord::verify_document(&document);
        if !valid {
            let fingerprint = document
                .get("fingerprint")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            warn!(record_id = %id, fingerprint, "Log record fingerprint mismatch");
        }
        Ok(valid)
    }

    /// Export the records matching `filter`, up to the export page limit.
    ///
    /// The format is checked before anything else, so an unknown format
    /// never triggers a search.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::UnsupportedFormat`] for an unknown format, a
    /// validation error for an inverted date range, or a store error.
    pub async fn export_logs(&self, filter: &Filter, format: &str) -> AuditResult<Export> {
        let format: ExportFormat = format.parse()?;
        filter.validate()?;

        let page = self
            .search
            .search(filter, PageRequest::first(self.export_page_limit))
            .await?;
        let filename = format.filename(self.clock.now());

        info!(
            format = %format,
            records = page.len(),
            filename = %filename,
            "Exporting log records"
        );
        Ok(Export {
            filename,
            format,
            stream: ExportStream::new(page, format),
        })
    }

    /// Total number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn count(&self) -> AuditResult<u64> {
        self.store.count().await
    }

    /// Drop expired query cache entries, returning how many were removed.
    pub fn purge_expired_cache(&self) -> usize {
        self.search.cache().purge_expired()
    }

    fn assign_timestamp(&self) -> Timestamp {
        let now = self.clock.now();
        let mut last = self
            .last_assigned
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let assigned = last.map_or(now, |prev| prev.max(now));
        *last = Some(assigned);
        assigned
    }
}

impl std::fmt::Debug for LogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogService")
            .field("search", &self.search)
            .field("max_per_page", &self.max_per_page)
            .field("export_page_limit", &self.export_page_limit)
            .finish_non_exhaustive()
    }
}

/// Builder for [`LogService`].
pub struct LogServiceBuilder {
    store: Option<Arc<dyn RecordStore>>,
    cache: Option<Arc<dyn QueryCache>>,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
    default_per_page: u32,
    max_per_page: u32,
    export_page_limit: u32,
}

impl Default for LogServiceBuilder {
    fn default() -> Self {
        Self {
            store: None,
            cache: None,
            clock: Arc::new(SystemClock),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
            export_page_limit: DEFAULT_EXPORT_PAGE_LIMIT,
        }
    }
}

impl LogServiceBuilder {
    /// Use a specific record store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a specific query cache. Overrides the TTL setting.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use a specific clock for timestamps and cache expiry.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cache time-to-live. Zero disables caching.
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Default page size for interactive searches.
    #[must_use]
    pub fn default_per_page(mut self, per_page: u32) -> Self {
        self.default_per_page = per_page;
        self
    }

    /// Largest page size accepted for interactive searches.
    #[must_use]
    pub fn max_per_page(mut self, max: u32) -> Self {
        self.max_per_page = max;
        self
    }

    /// Number of records an export is bounded to.
    #[must_use]
    pub fn export_page_limit(mut self, limit: u32) -> Self {
        self.export_page_limit = limit;
        self
    }

    /// Apply settings from a loaded configuration.
    #[must_use]
    pub fn config(self, config: &Config) -> Self {
        self.cache_ttl(Duration::from_secs(config.cache.ttl_secs))
            .default_per_page(config.search.default_per_page)
            .max_per_page(config.search.max_per_page)
            .export_page_limit(config.export.page_limit)
    }

    /// Build the service.
    #[must_use]
    pub fn build(self) -> LogService {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(KvRecordStore::in_memory()));
        let cache: Arc<dyn QueryCache> = match self.cache {
            Some(cache) => cache,
            None if self.cache_ttl.is_zero() => Arc::new(DisabledQueryCache),
            None => Arc::new(TtlQueryCache::new(self.cache_ttl, Arc::clone(&self.clock))),
        };

        LogService {
            search: SearchEngine::new(Arc::clone(&store), cache),
            store,
            clock: self.clock,
            last_assigned: Mutex::new(None),
            default_per_page: self.default_per_page,
            max_per_page: self.max_per_page,
            export_page_limit: self.export_page_limit,
        }
    }
}

impl std::fmt::Debug for LogServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogServiceBuilder")
            .field("cache_ttl", &self.cache_ttl)
            .field("max_per_page", &self.max_per_page)
            .field("export_page_limit", &self.export_page_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chronicle_core::ManualClock;
    use chronicle_storage::{KvStore, MemoryKvStore};
    use std::net::{IpAddr, Ipv4Addr};

    fn submission(system: &str) -> NewLogRecord {
        NewLogRecord::new(
            "123",
            system,
            "login",
            "user",
            "success",
            IpAddr::V4(Ipv4Addr::LOCALHOST),
        )
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::starting_at(
            Timestamp::parse("2024-01-15T10:00:00Z").unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_create_and_verify() {
        let service = LogService::in_memory();
        let record = service.create_log(submission("auth")).await.unwrap();
        assert_eq!(record.fingerprint.to_hex().len(), 64);
        assert!(service.verify_log(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_assigns_clock_time() {
        let clock = clock();
        let service = LogService::builder().clock(clock.clone()).build();
        let record = service.create_log(submission("auth")).await.unwrap();
        assert_eq!(record.body.timestamp, clock.now());
    }

    #[tokio::test]
    async fn test_assigned_timestamps_never_go_backwards() {
        let clock = clock();
        let service = LogService::builder().clock(clock.clone()).build();
        let first = service.create_log(submission("auth")).await.unwrap();

        clock.advance(chrono::Duration::seconds(-30));
        let second = service.create_log(submission("auth")).await.unwrap();
        assert!(second.body.timestamp >= first.body.timestamp);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields() {
        let service = LogService::in_memory();
        let mut blank = submission("");
        blank.resource = String::new();
        let err = service.create_log(blank).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.field_errors().len(), 2);
        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_verify_missing_record_is_not_found() {
        let service = LogService::in_memory();
        let err = service.verify_log(&RecordId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_verify_detects_tampering_in_store() {
        let kv = Arc::new(MemoryKvStore::new());
        let service = LogService::builder()
            .store(Arc::new(KvRecordStore::new(kv.clone())))
            .build();
        let record = service.create_log(submission("auth")).await.unwrap();

        let key = record.id.to_string();
        let raw = kv.get(crate::storage::NS_RECORDS, &key).await.unwrap().unwrap();
        let mut doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        doc["record"]["outcome"] = serde_json::json!("failure");
        kv.set(crate::storage::NS_RECORDS, &key, serde_json::to_vec(&doc).unwrap())
            .await
            .unwrap();

        assert!(!service.verify_log(&record.id).await.unwrap());
    }

    async fn tamper(kv: &MemoryKvStore, id: &RecordId, edit: impl FnOnce(&mut serde_json::Value)) {
        let key = id.to_string();
        let raw = kv.get(crate::storage::NS_RECORDS, &key).await.unwrap().unwrap();
        let mut doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        edit(&mut doc["record"]);
        kv.set(crate::storage::NS_RECORDS, &key, serde_json::to_vec(&doc).unwrap())
            .await
            .unwrap();
    }

    fn service_over(kv: &Arc<MemoryKvStore>) -> LogService {
        LogService::builder()
            .store(Arc::new(KvRecordStore::new(kv.clone())))
            .cache_ttl(Duration::ZERO)
            .build()
    }

    #[tokio::test]
    async fn test_verify_detects_added_field() {
        let kv = Arc::new(MemoryKvStore::new());
        let service = service_over(&kv);
        let record = service.create_log(submission("auth")).await.unwrap();

        tamper(&kv, &record.id, |doc| doc["injected"] = serde_json::json!("evil")).await;
        assert!(!service.verify_log(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_detects_removed_default_field() {
        let kv = Arc::new(MemoryKvStore::new());
        let service = service_over(&kv);
        let record = service.create_log(submission("auth")).await.unwrap();
        assert!(!record.body.sensitive);

        tamper(&kv, &record.id, |doc| {
            doc.as_object_mut().unwrap().remove("sensitive");
        })
        .await;
        assert!(!service.verify_log(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_undecodable_record_fails_verification_without_breaking_search() {
        let kv = Arc::new(MemoryKvStore::new());
        let service = service_over(&kv);
        let good = service.create_log(submission("auth")).await.unwrap();
        let bad = service.create_log(submission("auth")).await.unwrap();

        tamper(&kv, &bad.id, |doc| doc["source_address"] = serde_json::json!("not-an-ip")).await;

        assert!(!service.verify_log(&bad.id).await.unwrap());
        assert!(service.verify_log(&good.id).await.unwrap());

        let page = service
            .search_logs(&Filter::new(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].id, good.id);
    }

    #[tokio::test]
    async fn test_unparseable_document_fails_verification() {
        let kv = Arc::new(MemoryKvStore::new());
        let service = service_over(&kv);
        let record = service.create_log(submission("auth")).await.unwrap();

        kv.set(crate::storage::NS_RECORDS, &record.id.to_string(), b"{".to_vec())
            .await
            .unwrap();
        assert!(!service.verify_log(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_validates_bounds() {
        let service = LogService::in_memory();
        let err = service
            .search_logs(&Filter::new(), PageRequest::new(101, 1))
            .await
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "per_page");

        let inverted = Filter::new()
            .since(Timestamp::parse("2024-01-16T00:00:00Z").unwrap())
            .until(Timestamp::parse("2024-01-15T00:00:00Z").unwrap());
        let err = service
            .search_logs(&inverted, PageRequest::new(0, 1))
            .await
            .unwrap_err();
        assert_eq!(err.field_errors().len(), 2);
    }

    #[tokio::test]
    async fn test_export_rejects_format_before_dates() {
        let service = LogService::in_memory();
        let inverted = Filter::new()
            .since(Timestamp::parse("2024-01-16T00:00:00Z").unwrap())
            .until(Timestamp::parse("2024-01-15T00:00:00Z").unwrap());
        let err = service.export_logs(&inverted, "xml").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[tokio::test]
    async fn test_export_names_file_after_clock() {
        let service = LogService::builder().clock(clock()).build();
        service.create_log(submission("auth")).await.unwrap();

        let export = service.export_logs(&Filter::new(), "csv").await.unwrap();
        assert_eq!(export.filename, "logs_2024-01-15_100000.csv");
        assert_eq!(export.content_type(), "text/plain; charset=UTF-8");
        assert_eq!(export.stream.record_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let service = LogService::builder().cache_ttl(Duration::ZERO).build();
        service
            .search_logs(&Filter::new(), PageRequest::default())
            .await
            .unwrap();
        service.create_log(submission("auth")).await.unwrap();
        let page = service
            .search_logs(&Filter::new(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_config_applies_limits() {
        let mut config = Config::default();
        config.search.max_per_page = 10;
        config.search.default_per_page = 5;
        let service = LogService::builder().config(&config).build();

        assert_eq!(service.default_page(), PageRequest::new(5, 1));
        assert!(
            service
                .search_logs(&Filter::new(), PageRequest::new(11, 1))
                .await
                .is_err()
        );
    }
}
