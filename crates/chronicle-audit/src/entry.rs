//! Audit log record types.

use std::net::IpAddr;

use chronicle_core::{Map, RecordId, Timestamp, Value};
use chronicle_crypto::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::{AuditResult, Violations};

/// The fingerprinted body of a log record.
///
/// Every field here contributes to the fingerprint. The store-assigned id and
/// the fingerprint itself live on [`LogRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBody {
    /// When the event happened.
    pub timestamp: Timestamp,
    /// Who performed the action.
    #[serde(alias = "user_id")]
    pub actor: String,
    /// Originating system.
    pub system: String,
    /// What was done.
    #[serde(alias = "action_type")]
    pub action: String,
    /// What it was done to.
    pub resource: String,
    /// How it ended.
    #[serde(alias = "result")]
    pub outcome: String,
    /// Network address of the caller.
    #[serde(alias = "ip")]
    pub source_address: IpAddr,
    /// Open-ended structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map>,
    /// Whether the event touches sensitive data.
    #[serde(default, alias = "is_sensitive")]
    pub sensitive: bool,
}

impl LogBody {
    /// The value tree the fingerprint is computed over.
    ///
    /// An absent payload is left out of the map entirely, so `None` and an
    /// empty payload produce different fingerprints.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("timestamp".into(), Value::String(self.timestamp.to_rfc3339()));
        map.insert("actor".into(), Value::String(self.actor.clone()));
        map.insert("system".into(), Value::String(self.system.clone()));
        map.insert("action".into(), Value::String(self.action.clone()));
        map.insert("resource".into(), Value::String(self.resource.clone()));
        map.insert("outcome".into(), Value::String(self.outcome.clone()));
        map.insert(
            "source_address".into(),
            Value::String(self.source_address.to_string()),
        );
        if let Some(payload) = &self.payload {
            map.insert("payload".into(), Value::Map(payload.clone()));
        }
        map.insert("sensitive".into(), Value::Bool(self.sensitive));
        Value::Map(map)
    }

    /// Compute the fingerprint of this body.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.to_value())
    }

    /// Fingerprint the body, producing a record ready to be stored.
    #[must_use]
    pub fn seal(self) -> UnsavedRecord {
        let fingerprint = self.fingerprint();
        UnsavedRecord {
            body: self,
            fingerprint,
        }
    }
}

/// A sealed record that the store has not assigned an id to yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnsavedRecord {
    /// The record body.
    pub body: LogBody,
    /// Fingerprint over `body`.
    pub fingerprint: Fingerprint,
}

/// A persisted log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// The fingerprinted body.
    #[serde(flatten)]
    pub body: LogBody,
    /// Fingerprint recorded at creation time.
    #[serde(alias = "hash")]
    pub fingerprint: Fingerprint,
}

impl LogRecord {
    /// Attach a store-assigned id to a sealed record.
    #[must_use]
    pub fn from_unsaved(id: RecordId, unsaved: UnsavedRecord) -> Self {
        Self {
            id,
            body: unsaved.body,
            fingerprint: unsaved.fingerprint,
        }
    }

    /// Recompute the fingerprint from the current body and compare it,
    /// in constant time, with the stored one.
    #[must_use]
    pub fn verify_fingerprint(&self) -> bool {
        self.fingerprint.verify(&self.body.to_value())
    }

    /// Check a record document, as persisted, against the fingerprint it
    /// carries.
    ///
    /// The digest is recomputed over every stored key except `id` and
    /// `fingerprint`, taken as-is. An added key, a removed key or a value of
    /// the wrong type all produce a mismatch, even where decoding into
    /// [`LogRecord`] would have defaulted or ignored it.
    #[must_use]
    pub fn verify_document(document: &serde_json::Value) -> bool {
        let Some(fields) = document.as_object() else {
            return false;
        };
        let Some(fingerprint) = fields
            .get("fingerprint")
            .and_then(serde_json::Value::as_str)
            .and_then(|hex| Fingerprint::from_hex(hex).ok())
        else {
            return false;
        };

        let body: Map = fields
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "id" | "fingerprint"))
            .map(|(key, value)| (key.clone(), Value::from(value.clone())))
            .collect();
        fingerprint.verify(&Value::Map(body))
    }
}

/// A record submission, before a timestamp is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLogRecord {
    /// Event time. Assigned at write time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Who performed the action.
    #[serde(alias = "user_id")]
    pub actor: String,
    /// Originating system.
    pub system: String,
    /// What was done.
    #[serde(alias = "action_type")]
    pub action: String,
    /// What it was done to.
    pub resource: String,
    /// How it ended.
    #[serde(alias = "result")]
    pub outcome: String,
    /// Network address of the caller.
    #[serde(alias = "ip")]
    pub source_address: IpAddr,
    /// Open-ended structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map>,
    /// Whether the event touches sensitive data.
    #[serde(default, alias = "is_sensitive")]
    pub sensitive: bool,
}

impl NewLogRecord {
    /// Create a submission with the required fields.
    #[must_use]
    pub fn new(
        actor: impl Into<String>,
        system: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        outcome: impl Into<String>,
        source_address: IpAddr,
    ) -> Self {
        Self {
            timestamp: None,
            actor: actor.into(),
            system: system.into(),
            action: action.into(),
            resource: resource.into(),
            outcome: outcome.into(),
            source_address,
            payload: None,
            sensitive: false,
        }
    }

    /// Set an explicit event time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Map) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Mark the event as sensitive.
    #[must_use]
    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }

    /// Check that every required text field is non-empty and that the
    /// payload holds no NaN or infinite floats.
    ///
    /// All violations are reported together.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Validation`](crate::AuditError::Validation)
    /// listing each offending field.
    pub fn validate(&self) -> AuditResult<()> {
        let mut violations = Violations::default();
        for (field, value) in [
            ("actor", &self.actor),
            ("system", &self.system),
            ("action", &self.action),
            ("resource", &self.resource),
            ("outcome", &self.outcome),
        ] {
            if value.trim().is_empty() {
                violations.push(field, "is required");
            }
        }
        if self
            .payload
            .as_ref()
            .is_some_and(|payload| !payload.values().all(Value::is_finite))
        {
            violations.push("payload", "must not contain NaN or infinite numbers");
        }
        violations.into_result()
    }

    /// Turn the submission into a body, using `now` if no timestamp was given.
    #[must_use]
    pub fn into_body(self, now: Timestamp) -> LogBody {
        LogBody {
            timestamp: self.timestamp.unwrap_or(now),
            actor: self.actor,
            system: self.system,
            action: self.action,
            resource: self.resource,
            outcome: self.outcome,
            source_address: self.source_address,
            payload: self.payload,
            sensitive: self.sensitive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn login() -> NewLogRecord {
        NewLogRecord::new(
            "123",
            "auth",
            "login",
            "user",
            "success",
            IpAddr::V4(Ipv4Addr::LOCALHOST),
        )
    }

    fn now() -> Timestamp {
        Timestamp::parse("2024-01-15T10:00:00Z").unwrap()
    }

    #[test]
    fn test_seal_produces_verifiable_record() {
        let record = LogRecord::from_unsaved(RecordId::new(), login().into_body(now()).seal());
        assert_eq!(record.fingerprint.to_hex().len(), 64);
        assert!(record.verify_fingerprint());
    }

    #[test]
    fn test_mutation_breaks_verification() {
        let mut record =
            LogRecord::from_unsaved(RecordId::new(), login().into_body(now()).seal());
        record.body.outcome = "failure".into();
        assert!(!record.verify_fingerprint());
    }

    #[test]
    fn test_id_does_not_affect_fingerprint() {
        let sealed = login().into_body(now()).seal();
        let a = LogRecord::from_unsaved(RecordId::new(), sealed.clone());
        let b = LogRecord::from_unsaved(RecordId::new(), sealed);
        assert_ne!(a.id, b.id);
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_absent_and_empty_payload_differ() {
        let absent = login().into_body(now());
        let empty = login().with_payload(Map::new()).into_body(now());
        assert_ne!(absent.fingerprint(), empty.fingerprint());
    }

    #[test]
    fn test_sensitive_flag_is_fingerprinted() {
        let plain = login().into_body(now());
        let flagged = login().sensitive(true).into_body(now());
        assert_ne!(plain.fingerprint(), flagged.fingerprint());
    }

    #[test]
    fn test_into_body_keeps_explicit_timestamp() {
        let explicit = Timestamp::parse("2023-06-01T00:00:00Z").unwrap();
        let body = login().with_timestamp(explicit).into_body(now());
        assert_eq!(body.timestamp, explicit);
        assert_eq!(login().into_body(now()).timestamp, now());
    }

    #[test]
    fn test_validate_reports_every_blank_field() {
        let mut submission = login();
        submission.actor = String::new();
        submission.outcome = "  ".into();
        let err = submission.validate().unwrap_err();
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["actor", "outcome"]);
        assert!(login().validate().is_ok());
    }

    #[test]
    fn test_submission_accepts_wire_aliases() {
        let submission: NewLogRecord = serde_json::from_value(serde_json::json!({
            "user_id": "123",
            "system": "auth",
            "action_type": "login",
            "resource": "user",
            "result": "success",
            "ip": "127.0.0.1",
            "is_sensitive": true,
        }))
        .unwrap();
        assert_eq!(submission.actor, "123");
        assert_eq!(submission.action, "login");
        assert_eq!(submission.outcome, "success");
        assert!(submission.sensitive);
        assert!(submission.timestamp.is_none());
    }

    #[test]
    fn test_record_json_roundtrip_keeps_fingerprint_valid() {
        let mut payload = Map::new();
        payload.insert("attempt".into(), Value::Integer(2));
        payload.insert("note".into(), Value::from("café"));
        let record = LogRecord::from_unsaved(
            RecordId::new(),
            login().with_payload(payload).into_body(now()).seal(),
        );

        let json = serde_json::to_string(&record).unwrap();
        let back: LogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(back.verify_fingerprint());
    }

    #[test]
    fn test_validate_rejects_non_finite_payload() {
        let mut nested = Map::new();
        nested.insert("ratio".into(), Value::Float(f64::NAN));
        let mut payload = Map::new();
        payload.insert("stats".into(), Value::Map(nested));
        payload.insert("limit".into(), Value::Float(f64::INFINITY));

        let mut submission = login().with_payload(payload);
        submission.system = String::new();
        let err = submission.validate().unwrap_err();
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["system", "payload"]);

        let mut finite = Map::new();
        finite.insert("ratio".into(), Value::Float(0.5));
        assert!(login().with_payload(finite).validate().is_ok());
    }

    fn stored_document(record: &LogRecord) -> serde_json::Value {
        serde_json::to_value(record).unwrap()
    }

    #[test]
    fn test_verify_document_accepts_untouched_record() {
        let mut payload = Map::new();
        payload.insert("amount".into(), Value::Float(19.99));
        payload.insert("items".into(), Value::List(vec![Value::from("sku-1")]));
        let record = LogRecord::from_unsaved(
            RecordId::new(),
            login().with_payload(payload).into_body(now()).seal(),
        );
        assert!(LogRecord::verify_document(&stored_document(&record)));
    }

    #[test]
    fn test_verify_document_detects_added_and_removed_keys() {
        let record = LogRecord::from_unsaved(RecordId::new(), login().into_body(now()).seal());

        let mut added = stored_document(&record);
        added["injected"] = serde_json::json!("evil");
        assert!(!LogRecord::verify_document(&added));

        let mut removed = stored_document(&record);
        removed.as_object_mut().unwrap().remove("sensitive");
        assert!(!LogRecord::verify_document(&removed));

        let mut retyped = stored_document(&record);
        retyped["source_address"] = serde_json::json!(["127.0.0.1"]);
        assert!(!LogRecord::verify_document(&retyped));
    }

    #[test]
    fn test_verify_document_rejects_malformed_fingerprint() {
        let record = LogRecord::from_unsaved(RecordId::new(), login().into_body(now()).seal());
        let mut doc = stored_document(&record);
        doc["fingerprint"] = serde_json::json!("zz");
        assert!(!LogRecord::verify_document(&doc));
        assert!(!LogRecord::verify_document(&serde_json::json!("not a record")));
    }
}
