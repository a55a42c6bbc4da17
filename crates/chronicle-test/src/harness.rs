//! Test harness helpers.

use std::sync::{Arc, Once};

use chronicle_audit::{KvRecordStore, LogService, LogServiceBuilder, NS_RECORDS};
use chronicle_core::{ManualClock, RecordId};
use chronicle_storage::{KvStore, MemoryKvStore};
use chronicle_telemetry::{LogConfig, LogFormat, subscriber_with_writer};
use tempfile::NamedTempFile;
use tracing_subscriber::fmt::TestWriter;

use crate::fixtures::test_timestamp;

static LOGGING: Once = Once::new();

/// Route `tracing` output through the test writer at the given level.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn setup_test_logging(level: &str) {
    let level = level.to_owned();
    LOGGING.call_once(move || {
        let config = LogConfig::new(level)
            .with_format(LogFormat::Compact)
            .without_ansi();
        if let Ok(subscriber) = subscriber_with_writer(&config, TestWriter::new) {
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    });
}

/// Write `contents` to a temporary `.toml` file.
///
/// # Panics
///
/// Panics if the file cannot be created or written.
#[must_use]
pub fn test_config_file(contents: &str) -> NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write to temp file");
    file
}

/// A log service over an in-memory store with a manual clock.
///
/// The clock starts at [`EPOCH`](crate::fixtures::EPOCH) and only moves when
/// told to.
#[derive(Debug)]
pub struct TestLog {
    /// Raw key-value store under the record store.
    pub kv: Arc<MemoryKvStore>,
    /// Clock shared by the service and its cache.
    pub clock: Arc<ManualClock>,
    /// The service under test.
    pub service: Arc<LogService>,
}

impl TestLog {
    /// Harness with default service settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_builder(|builder| builder)
    }

    /// Harness whose service builder is adjusted by `configure`.
    ///
    /// The store and clock are set before `configure` runs.
    #[must_use]
    pub fn with_builder(configure: impl FnOnce(LogServiceBuilder) -> LogServiceBuilder) -> Self {
        let kv = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::starting_at(test_timestamp()));
        let builder = LogService::builder()
            .store(Arc::new(KvRecordStore::new(kv.clone())))
            .clock(clock.clone());
        let service = Arc::new(configure(builder).build());
        Self { kv, clock, service }
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: chrono::Duration) {
        self.clock.advance(delta);
    }

    /// Overwrite one body field of a stored record, leaving its fingerprint
    /// alone. Passing `None` removes the field.
    ///
    /// # Panics
    ///
    /// Panics if the record does not exist or is not a JSON object.
    pub async fn tamper(&self, id: &RecordId, field: &str, value: Option<serde_json::Value>) {
        let key = id.to_string();
        let bytes = self
            .kv
            .get(NS_RECORDS, &key)
            .await
            .expect("store read failed")
            .expect("record not found");
        let mut doc: serde_json::Value =
            serde_json::from_slice(&bytes).expect("stored record is not JSON");
        let record = doc
            .get_mut("record")
            .and_then(serde_json::Value::as_object_mut)
            .expect("stored document has no record object");
        match value {
            Some(value) => {
                record.insert(field.to_owned(), value);
            },
            None => {
                record.remove(field);
            },
        }
        self.kv
            .set(NS_RECORDS, &key, serde_json::to_vec(&doc).expect("encode"))
            .await
            .expect("store write failed");
    }
}

impl Default for TestLog {
    fn default() -> Self {
        Self::new()
    }
}
