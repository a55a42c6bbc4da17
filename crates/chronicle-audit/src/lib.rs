//! Chronicle Audit - Tamper-evident audit log store.
//!
//! This crate provides:
//! - Append-only log records sealed with a SHA-256 fingerprint
//! - Verification of stored records against their fingerprint
//! - Filtered, paginated search behind a time-bounded query cache
//! - CSV and JSON export streamed from a single result page
//! - A background ingest queue for asynchronous writes
//!
//! # Integrity Model
//!
//! Every record's fingerprint is computed over the canonical encoding of its
//! body at creation time. Any later change to a stored body, including an
//! added or removed field, makes [`LogService::verify_log`] return `false`.
//! This detects tampering; it does not prevent a writer with store access
//! from replacing both the body and the fingerprint.
//!
//! # Caching
//!
//! Search results are cached per filter and page for a fixed TTL (five
//! minutes by default) and are not invalidated on write. A record may be
//! missing from searches for up to one TTL after it was created.
//!
//! # Example
//!
//! ```
//! use chronicle_audit::{Filter, LogService, NewLogRecord};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let service = LogService::in_memory();
//!
//! let record = service
//!     .create_log(NewLogRecord::new(
//!         "123",
//!         "auth",
//!         "login",
//!         "user",
//!         "success",
//!         IpAddr::V4(Ipv4Addr::LOCALHOST),
//!     ))
//!     .await
//!     .unwrap();
//! assert!(service.verify_log(&record.id).await.unwrap());
//!
//! let page = service
//!     .search_logs(&Filter::new().system("auth"), service.default_page())
//!     .await
//!     .unwrap();
//! assert_eq!(page.total, 1);
//!
//! let export = service.export_logs(&Filter::new(), "json").await.unwrap();
//! let body = export.stream.into_bytes().unwrap();
//! assert!(body.starts_with(b"[\n"));
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod cache;
mod entry;
mod error;
mod export;
mod filter;
mod ingest;
mod search;
mod service;
mod storage;

pub use cache::{CacheEntry, DEFAULT_CACHE_TTL_SECS, DisabledQueryCache, QueryCache, TtlQueryCache};
pub use entry::{LogBody, LogRecord, NewLogRecord, UnsavedRecord};
pub use error::{AuditError, AuditResult, ErrorKind, FieldError};
pub use export::{
    CSV_HEADERS, DEFAULT_EXPORT_PAGE_LIMIT, Export, ExportFormat, ExportStream, UTF8_BOM, serialize,
};
pub use filter::{
    CACHE_KEY_VERSION, CacheKey, DEFAULT_PER_PAGE, Filter, MAX_PER_PAGE, PageRequest, parse_bound,
};
pub use ingest::{IngestHandle, IngestQueue, IngestReport};
pub use search::{Page, SearchEngine};
pub use service::{LogService, LogServiceBuilder};
pub use storage::{KvRecordStore, NS_RECORDS, RecordStore, ScanPage, ScanRequest, SortOrder};
