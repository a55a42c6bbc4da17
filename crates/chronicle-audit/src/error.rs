//! Audit log error types.

use std::fmt;

use chronicle_storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Wire name of the offending field.
    pub field: String,
    /// Human readable reason.
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Coarse classification callers map onto their transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input was rejected before any work happened.
    Validation,
    /// The referenced record does not exist.
    NotFound,
    /// The requested export format is not known.
    UnsupportedFormat,
    /// The store, serializer or output sink failed.
    Infrastructure,
}

/// Errors that can occur with audit logging.
#[derive(Debug, Error)]
pub enum AuditError {
    /// One or more input fields were rejected.
    #[error("validation failed: {}", join_field_errors(.errors))]
    Validation {
        /// Every violation found, in field order.
        errors: Vec<FieldError>,
    },

    /// Record not found.
    #[error("log record not found: {id}")]
    NotFound {
        /// The record ID that was not found.
        id: String,
    },

    /// Export format not recognized.
    #[error("unsupported export format: {format}")]
    UnsupportedFormat {
        /// The format string as given.
        format: String,
    },

    /// The record store failed.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Writing export output failed.
    #[error("export write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl AuditError {
    /// Build a validation error for a single field.
    #[must_use]
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::StoreUnavailable(_) | Self::Serialization(_) | Self::Io(_) => {
                ErrorKind::Infrastructure
            },
        }
    }

    /// Field errors carried by a validation failure (empty otherwise).
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { errors } => errors,
            _ => &[],
        }
    }
}

impl From<StorageError> for AuditError {
    fn from(e: StorageError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Collects field errors and turns them into a single [`AuditError`].
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<FieldError>);

impl Violations {
    pub(crate) fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub(crate) fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    pub(crate) fn into_result(self) -> AuditResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AuditError::Validation { errors: self.0 })
        }
    }
}
