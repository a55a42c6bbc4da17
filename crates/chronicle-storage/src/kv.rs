//! Raw key-value store trait and implementations.
//!
//! The [`KvStore`] trait provides byte-level operations with namespaced
//! keys. The audit log is append-only, so the trait exposes no delete:
//! writers use [`put_if_absent`](KvStore::put_if_absent) to claim a key
//! exactly once and [`set`](KvStore::set) only for bookkeeping values.
//!
//! # Namespacing
//!
//! All operations are scoped to a namespace. The audit log keeps records in
//! `logs:records` and its counters in `logs:meta`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::trace;

use crate::error::{StorageError, StorageResult};

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that a namespace is safe for use as a key prefix.
///
/// Namespaces must be non-empty and must not contain the null byte
/// (used internally as the namespace/key separator).
fn validate_namespace(namespace: &str) -> StorageResult<()> {
    if namespace.is_empty() {
        return Err(StorageError::InvalidKey(
            "namespace must not be empty".into(),
        ));
    }
    if namespace.contains('\0') {
        return Err(StorageError::InvalidKey(
            "namespace must not contain null bytes".into(),
        ));
    }
    Ok(())
}

/// Validate that a key is safe for storage.
///
/// Keys must be non-empty and must not contain the null byte.
fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".into()));
    }
    if key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "key must not contain null bytes".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A key-value entry with its namespace and key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    /// The namespace this entry belongs to.
    pub namespace: String,
    /// The key within the namespace.
    pub key: String,
    /// The raw value bytes.
    pub value: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Raw key-value store trait.
///
/// Provides namespaced byte-level storage. All operations are scoped
/// to a namespace for isolation.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by namespace and key.
    ///
    /// Returns `None` if the key does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value for a namespace and key.
    ///
    /// Overwrites any existing value.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Store a value only if the key is not yet present.
    ///
    /// Returns `true` if the value was written, `false` if the key was taken.
    async fn put_if_absent(&self, namespace: &str, key: &str, value: Vec<u8>)
    -> StorageResult<bool>;

    /// List all keys in a namespace.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Read every entry in a namespace as one point-in-time view.
    async fn scan(&self, namespace: &str) -> StorageResult<Vec<KvEntry>>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-memory key-value store for tests and embedded use.
///
/// Keys are stored as `"{namespace}\0{key}"` in a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create a new empty in-memory KV store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(namespace: &str, key: &str) -> String {
        format!("{namespace}\0{key}")
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(data.get(&Self::full_key(namespace, key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        data.insert(Self::full_key(namespace, key), value);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let full_key = Self::full_key(namespace, key);
        if data.contains_key(&full_key) {
            trace!(namespace, key, "put_if_absent: key already present");
            return Ok(false);
        }
        data.insert(full_key, value);
        Ok(true)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let prefix = format!("{namespace}\0");
        Ok(data
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(String::from))
            .collect())
    }

    async fn scan(&self, namespace: &str) -> StorageResult<Vec<KvEntry>> {
        validate_namespace(namespace)?;
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let prefix = format!("{namespace}\0");
        Ok(data
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(&prefix).map(|key| KvEntry {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    value: v.clone(),
                })
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
