//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur when handling fingerprints.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid fingerprint length.
    #[error("invalid fingerprint length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Invalid hex encoding.
    #[error("invalid hex encoding: {0}")]
    InvalidHexEncoding(String),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
