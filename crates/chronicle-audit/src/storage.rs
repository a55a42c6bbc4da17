//! Record store trait and the key-value backed implementation.

use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_core::RecordId;
use chronicle_storage::{KvStore, MemoryKvStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::entry::{LogRecord, UnsavedRecord};
use crate::error::{AuditError, AuditResult};
use crate::filter::Filter;

/// Result ordering for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Timestamp descending, most recently inserted first on ties.
    #[default]
    NewestFirst,
}

impl SortOrder {
    /// Stable tag used in cache keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewestFirst => "timestamp_desc",
        }
    }
}

/// A filtered, ordered and paginated scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest<'a> {
    /// Which records to include.
    pub filter: &'a Filter,
    /// How to order them.
    pub order: SortOrder,
    /// Maximum number of records to return.
    pub limit: usize,
    /// Number of matching records to skip.
    pub offset: usize,
}

/// One page of a scan plus the total number of matches.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// Records on this page.
    pub records: Vec<LogRecord>,
    /// Matches across all pages.
    pub total: u64,
}

/// Storage backend for log records.
///
/// Implementations must be thread-safe. Records are append-only: there is
/// no update or delete.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a sealed record and return the id assigned to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    async fn insert(&self, record: &UnsavedRecord) -> AuditResult<RecordId>;

    /// Get a record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn find_by_id(&self, id: &RecordId) -> AuditResult<Option<LogRecord>>;

    /// Get a record exactly as persisted, without decoding it into a
    /// [`LogRecord`].
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails or the stored bytes are not a
    /// record document.
    async fn find_document(&self, id: &RecordId) -> AuditResult<Option<serde_json::Value>>;

    /// Scan matching records as of one point in time.
    ///
    /// Records that can no longer be decoded are left out of the page.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    async fn scan(&self, request: ScanRequest<'_>) -> AuditResult<ScanPage>;

    /// Count all records.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    async fn count(&self) -> AuditResult<u64>;
}

// -- Namespace constants --

/// Namespace holding one JSON document per record, keyed by record id.
pub const NS_RECORDS: &str = "logs:records";
const NS_META: &str = "logs:meta";
const KEY_NEXT_SEQUENCE: &str = "next_sequence";

/// The document persisted per record.
///
/// `sequence` is the insertion order used to break timestamp ties. It is not
/// part of the fingerprint.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    sequence: u64,
    record: LogRecord,
}

/// [`RecordStore`] on top of a namespaced [`KvStore`].
pub struct KvRecordStore {
    store: Arc<dyn KvStore>,
    /// Serializes sequence allocation.
    write_lock: Mutex<()>,
}

impl KvRecordStore {
    /// Create a record store over a key-value store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Create an in-memory record store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    async fn next_sequence(&self) -> AuditResult<u64> {
        match self.store.get(NS_META, KEY_NEXT_SEQUENCE).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(0),
        }
    }

    fn decode(bytes: &[u8]) -> AuditResult<StoredRecord> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[async_trait]
impl RecordStore for KvRecordStore {
    async fn insert(&self, record: &UnsavedRecord) -> AuditResult<RecordId> {
        let _guard = self.write_lock.lock().await;

        let sequence = self.next_sequence().await?;
        let id = RecordId::new();
        let stored = StoredRecord {
            sequence,
            record: LogRecord::from_unsaved(id, record.clone()),
        };
        let data = serde_json::to_vec(&stored)?;

        if !self
            .store
            .put_if_absent(NS_RECORDS, &id.to_string(), data)
            .await?
        {
            return Err(AuditError::StoreUnavailable(format!(
                "record id already taken: {id}"
            )));
        }

        let next = serde_json::to_vec(&sequence.saturating_add(1))?;
        self.store.set(NS_META, KEY_NEXT_SEQUENCE, next).await?;

        trace!(record_id = %id, sequence, "record persisted");
        Ok(id)
    }

    async fn find_by_id(&self, id: &RecordId) -> AuditResult<Option<LogRecord>> {
        match self.store.get(NS_RECORDS, &id.to_string()).await? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?.record)),
            None => Ok(None),
        }
    }

    async fn find_document(&self, id: &RecordId) -> AuditResult<Option<serde_json::Value>> {
        let Some(bytes) = self.store.get(NS_RECORDS, &id.to_string()).await? else {
            return Ok(None);
        };
        let mut document: serde_json::Value = serde_json::from_slice(&bytes)?;
        match document.get_mut("record").map(serde_json::Value::take) {
            Some(record) => Ok(Some(record)),
            None => Err(AuditError::Serialization(format!(
                "stored document for {id} has no record"
            ))),
        }
    }

    async fn scan(&self, request: ScanRequest<'_>) -> AuditResult<ScanPage> {
        let entries = self.store.scan(NS_RECORDS).await?;

        let mut matching = Vec::new();
        for entry in entries {
            let stored = match Self::decode(&entry.value) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(key = %entry.key, error = %e, "Skipping unreadable log record");
                    continue;
                },
            };
            if request.filter.matches(&stored.record) {
                matching.push(stored);
            }
        }

        match request.order {
            SortOrder::NewestFirst => {
                matching.sort_by_key(|s| (Reverse(s.record.body.timestamp), Reverse(s.sequence)));
            },
        }

        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let records = matching
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .map(|s| s.record)
            .collect();

        Ok(ScanPage { records, total })
    }

    async fn count(&self) -> AuditResult<u64> {
        let keys = self.store.list_keys(NS_RECORDS).await?;
        Ok(u64::try_from(keys.len()).unwrap_or(u64::MAX))
    }
}

impl std::fmt::Debug for KvRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvRecordStore").finish_non_exhaustive()
    }
}
