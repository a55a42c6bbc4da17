//! Chronicle Storage - namespaced document storage.
//!
//! The persistent storage engine behind the audit log is an external
//! collaborator. This crate defines the narrow byte-level interface the
//! record adapter needs from it:
//!
//! - [`KvStore`]: namespaced `get`/`set`/`put_if_absent`/`scan`
//! - [`MemoryKvStore`]: in-process implementation for tests and embedding
//!
//! # Usage
//!
//! ```rust
//! use chronicle_storage::{KvStore, MemoryKvStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryKvStore::new();
//! assert!(store.put_if_absent("logs:records", "a", b"1".to_vec()).await.unwrap());
//! assert!(!store.put_if_absent("logs:records", "a", b"2".to_vec()).await.unwrap());
//! assert_eq!(store.get("logs:records", "a").await.unwrap(), Some(b"1".to_vec()));
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvEntry, KvStore, MemoryKvStore};
