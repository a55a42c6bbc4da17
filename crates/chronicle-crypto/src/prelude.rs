//! Prelude module - commonly used types for convenient import.
//!
//! Use `use chronicle_crypto::prelude::*;` to import all essential types.

// Errors
pub use crate::{CryptoError, CryptoResult};

// Canonical encoding
pub use crate::{CANONICAL_VERSION, canonical_bytes};

// Fingerprints
pub use crate::Fingerprint;
