//! SHA-256 integrity fingerprints.
//!
//! A fingerprint is the SHA-256 digest of a value's canonical encoding,
//! rendered as 64 lowercase hex characters.

use chronicle_core::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

use crate::canonical::canonical_bytes;
use crate::error::{CryptoError, CryptoResult};

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// A SHA-256 fingerprint (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint a value via its canonical encoding.
    #[must_use]
    pub fn compute(value: &Value) -> Self {
        Self::digest(&canonical_bytes(value))
    }

    /// Hash raw bytes.
    #[must_use]
    pub fn digest(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Recompute the fingerprint of `value` and compare it to this one.
    ///
    /// The comparison is constant-time so a mismatch leaks nothing about how
    /// many leading bytes agreed.
    #[must_use]
    pub fn verify(&self, value: &Value) -> bool {
        self.ct_matches(&Self::compute(value))
    }

    /// Constant-time equality.
    #[must_use]
    pub fn ct_matches(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Encode as lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidHexEncoding(e.to_string()))?;
        let actual = bytes.len();
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            expected: 32,
            actual,
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        Value::from(json!({
            "actor": "123",
            "system": "auth",
            "action": "login",
            "resource": "user",
            "outcome": "success",
            "source_address": "127.0.0.1",
        }))
    }

    #[test]
    fn test_hex_is_64_lowercase_chars() {
        let hex = Fingerprint::compute(&sample()).to_hex();
        assert_eq!(hex.len(), FINGERPRINT_HEX_LEN);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_compute_is_deterministic() {
        assert_eq!(Fingerprint::compute(&sample()), Fingerprint::compute(&sample()));
    }

    #[test]
    fn test_verify_detects_mutation() {
        let original = sample();
        let fingerprint = Fingerprint::compute(&original);
        assert!(fingerprint.verify(&original));

        let mut tampered = original.clone();
        if let Value::Map(map) = &mut tampered {
            map.insert("outcome".into(), Value::from("failure"));
        }
        assert!(!fingerprint.verify(&tampered));
    }

    #[test]
    fn test_verify_detects_field_addition_and_removal() {
        let original = sample();
        let fingerprint = Fingerprint::compute(&original);

        let mut added = original.clone();
        if let Value::Map(map) = &mut added {
            map.insert("extra".into(), Value::Null);
        }
        assert!(!fingerprint.verify(&added));

        let mut removed = original;
        if let Value::Map(map) = &mut removed {
            map.remove("resource");
        }
        assert!(!fingerprint.verify(&removed));
    }

    #[test]
    fn test_digest_matches_known_sha256() {
        assert_eq!(
            Fingerprint::digest(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hex_roundtrip_and_errors() {
        let fp = Fingerprint::compute(&sample());
        assert_eq!(Fingerprint::from_hex(&fp.to_hex()).unwrap(), fp);
        assert!(matches!(
            Fingerprint::from_hex("zz"),
            Err(CryptoError::InvalidHexEncoding(_))
        ));
        assert!(matches!(
            Fingerprint::from_hex("abcd"),
            Err(CryptoError::InvalidLength { actual: 2, .. })
        ));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let fp = Fingerprint::compute(&sample());
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp.to_hex()));
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
    }
}
