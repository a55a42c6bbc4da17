//! Background ingestion of log submissions.
//!
//! A bounded queue drained by a single tokio task. Each submission goes
//! through [`LogService::create_log`]; failures are logged and counted but
//! not retried.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::entry::NewLogRecord;
use crate::error::{AuditError, AuditResult};
use crate::service::LogService;

/// Outcome counts for an ingest worker's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Submissions persisted.
    pub processed: u64,
    /// Submissions rejected or failed.
    pub failed: u64,
}

/// Spawns ingest workers.
#[derive(Debug, Clone, Copy)]
pub struct IngestQueue;

impl IngestQueue {
    /// Start a worker on the current tokio runtime.
    ///
    /// `capacity` bounds the number of queued submissions (minimum 1).
    #[must_use]
    pub fn spawn(service: Arc<LogService>, capacity: usize) -> IngestHandle {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run(service, rx));
        IngestHandle { tx, worker }
    }
}

async fn run(service: Arc<LogService>, mut rx: mpsc::Receiver<NewLogRecord>) -> IngestReport {
    let mut report = IngestReport::default();
    while let Some(submission) = rx.recv().await {
        let snapshot = submission.clone();
        match service.create_log(submission).await {
            Ok(record) => {
                report.processed = report.processed.saturating_add(1);
                debug!(record_id = %record.id, "Ingested log record");
            },
            Err(e) => {
                report.failed = report.failed.saturating_add(1);
                error!(
                    error = %e,
                    submission = ?snapshot,
                    "Failed to process log submission"
                );
            },
        }
    }
    debug!(
        processed = report.processed,
        failed = report.failed,
        "Ingest queue closed"
    );
    report
}

/// Handle to a running ingest worker.
#[derive(Debug)]
pub struct IngestHandle {
    tx: mpsc::Sender<NewLogRecord>,
    worker: JoinHandle<IngestReport>,
}

impl IngestHandle {
    /// Queue a submission, waiting for space if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::StoreUnavailable`] if the worker has stopped.
    pub async fn submit(&self, submission: NewLogRecord) -> AuditResult<()> {
        self.tx
            .send(submission)
            .await
            .map_err(|_| AuditError::StoreUnavailable("ingest worker has stopped".into()))
    }

    /// Close the queue, wait for the backlog to drain and return the counts.
    pub async fn shutdown(self) -> IngestReport {
        drop(self.tx);
        match self.worker.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Ingest worker terminated abnormally");
                IngestReport::default()
            },
        }
    }
}
