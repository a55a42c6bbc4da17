//! Chronicle Test - shared test utilities.
//!
//! Fixtures for common submissions and a [`TestLog`] harness: a
//! [`LogService`](chronicle_audit::LogService) over an in-memory store with a
//! manual clock, plus direct store access for tampering with records.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! chronicle-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use chronicle_test::{TestLog, auth_login};
//!
//! #[tokio::test]
//! async fn detects_tampering() {
//!     let log = TestLog::new();
//!     let record = log.service.create_log(auth_login()).await.unwrap();
//!     log.tamper(&record.id, "outcome", "failure".into()).await;
//!     assert!(!log.service.verify_log(&record.id).await.unwrap());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::*;
