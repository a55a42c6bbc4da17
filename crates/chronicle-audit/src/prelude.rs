//! Prelude module - commonly used types for convenient import.
//!
//! Use `use chronicle_audit::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use chronicle_audit::prelude::*;
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let service = LogService::in_memory();
//! let submission = NewLogRecord::new(
//!     "123", "auth", "login", "user", "success",
//!     IpAddr::V4(Ipv4Addr::LOCALHOST),
//! );
//! let record = service.create_log(submission).await.unwrap();
//! assert!(service.verify_log(&record.id).await.unwrap());
//! # }
//! ```

// Errors
pub use crate::{AuditError, AuditResult, ErrorKind, FieldError};

// Records
pub use crate::{LogBody, LogRecord, NewLogRecord};

// Queries
pub use crate::{Filter, Page, PageRequest};

// Service
pub use crate::{Export, ExportFormat, ExportStream, LogService, LogServiceBuilder};

// Background ingestion
pub use crate::{IngestHandle, IngestQueue, IngestReport};
