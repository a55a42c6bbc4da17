//! Chronicle Crypto - Canonical encoding and integrity fingerprints.
//!
//! This crate provides:
//! - A deterministic, type-tagged byte encoding of [`Value`] trees
//! - SHA-256 [`Fingerprint`]s over that encoding
//! - Constant-time fingerprint verification
//!
//! # Integrity Model
//!
//! A fingerprint is a keyless digest, not a signature. It makes any change
//! to a record after it was written detectable, but a party able to rewrite
//! both the record and its stored fingerprint is outside the threat model.
//!
//! # Example
//!
//! ```
//! use chronicle_core::Value;
//! use chronicle_crypto::Fingerprint;
//!
//! let record = Value::from(serde_json::json!({ "actor": "123", "system": "auth" }));
//! let fingerprint = Fingerprint::compute(&record);
//!
//! assert_eq!(fingerprint.to_hex().len(), 64);
//! assert!(fingerprint.verify(&record));
//! ```
//!
//! [`Value`]: chronicle_core::Value

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod canonical;
mod error;
mod fingerprint;

pub use canonical::{CANONICAL_VERSION, canonical_bytes, normalize_float};
pub use error::{CryptoError, CryptoResult};
pub use fingerprint::{FINGERPRINT_HEX_LEN, Fingerprint};
