//! Query descriptors: filters, page requests and the cache keys derived
//! from them.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use chronicle_core::{Map, Timestamp, Value};
use chronicle_crypto::{CANONICAL_VERSION, Fingerprint, canonical_bytes};
use serde::{Deserialize, Deserializer, Serialize};

use crate::entry::LogRecord;
use crate::error::{AuditResult, Violations};
use crate::storage::SortOrder;

/// Version of the cache key derivation. Bump when the key inputs change.
pub const CACHE_KEY_VERSION: u32 = 1;

/// Default page size for interactive queries.
pub const DEFAULT_PER_PAGE: u32 = 15;

/// Upper bound on the page size for interactive queries.
pub const MAX_PER_PAGE: u32 = 100;

/// Constraints on which records a search returns.
///
/// Unset and empty fields impose no constraint. The time range is inclusive
/// at both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Exact match on the actor.
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Exact match on the system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Exact match on the action.
    #[serde(
        rename = "action_type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub action: Option<String>,
    /// Earliest timestamp to include.
    #[serde(
        default,
        deserialize_with = "deserialize_bound",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_start: Option<Timestamp>,
    /// Latest timestamp to include.
    #[serde(
        default,
        deserialize_with = "deserialize_bound",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_end: Option<Timestamp>,
}

impl Filter {
    /// A filter with no constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain the actor.
    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Constrain the system.
    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Constrain the action.
    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Set the lower time bound.
    #[must_use]
    pub fn since(mut self, start: Timestamp) -> Self {
        self.date_start = Some(start);
        self
    }

    /// Set the upper time bound.
    #[must_use]
    pub fn until(mut self, end: Timestamp) -> Self {
        self.date_end = Some(end);
        self
    }

    /// Drop empty string constraints.
    #[must_use]
    pub fn normalized(&self) -> Self {
        fn keep(field: Option<&String>) -> Option<String> {
            field.filter(|s| !s.is_empty()).cloned()
        }
        Self {
            actor: keep(self.actor.as_ref()),
            system: keep(self.system.as_ref()),
            action: keep(self.action.as_ref()),
            date_start: self.date_start,
            date_end: self.date_end,
        }
    }

    /// Whether no constraint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.normalized() == Self::default()
    }

    /// Check the time range.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `date_end` precedes `date_start`.
    pub fn validate(&self) -> AuditResult<()> {
        self.violations().into_result()
    }

    pub(crate) fn violations(&self) -> Violations {
        let mut violations = Violations::default();
        if matches!((self.date_start, self.date_end), (Some(start), Some(end)) if end < start) {
            violations.push("date_end", "must be a date after or equal to date_start");
        }
        violations
    }

    /// Whether a record satisfies every constraint.
    #[must_use]
    pub fn matches(&self, record: &LogRecord) -> bool {
        fn eq(constraint: Option<&String>, value: &str) -> bool {
            constraint.is_none_or(|c| c.is_empty() || c == value)
        }
        let body = &record.body;
        eq(self.actor.as_ref(), &body.actor)
            && eq(self.system.as_ref(), &body.system)
            && eq(self.action.as_ref(), &body.action)
            && self.date_start.is_none_or(|start| body.timestamp >= start)
            && self.date_end.is_none_or(|end| body.timestamp <= end)
    }

    /// Derive the cache key for this filter and page.
    ///
    /// Empty constraints are dropped first, so filters that constrain the
    /// same fields to the same values share a key however they were built.
    #[must_use]
    pub fn cache_key(&self, page: PageRequest, order: SortOrder) -> CacheKey {
        let filter = self.normalized();
        let mut constraints = Map::new();
        let strings = [
            ("user_id", filter.actor),
            ("system", filter.system),
            ("action_type", filter.action),
        ];
        for (name, value) in strings {
            if let Some(value) = value {
                constraints.insert(name.into(), Value::String(value));
            }
        }
        for (name, bound) in [("date_start", filter.date_start), ("date_end", filter.date_end)] {
            if let Some(bound) = bound {
                constraints.insert(name.into(), Value::String(bound.to_rfc3339()));
            }
        }

        let mut key = Map::new();
        key.insert("filter".into(), Value::Map(constraints));
        key.insert("per_page".into(), Value::Integer(i64::from(page.per_page)));
        key.insert("page".into(), Value::Integer(i64::from(page.page)));
        key.insert("order".into(), Value::from(order.as_str()));
        key.insert(
            "fingerprint_scheme".into(),
            Value::Integer(i64::from(CANONICAL_VERSION)),
        );

        let digest = Fingerprint::digest(&canonical_bytes(&Value::Map(key)));
        CacheKey(format!("logs:v{CACHE_KEY_VERSION}:{}", digest.to_hex()))
    }
}

/// Accept RFC 3339, `YYYY-MM-DD HH:MM:SS` or a bare date (midnight UTC).
fn deserialize_bound<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    parse_bound(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
}

/// Parse a date bound as accepted on the wire.
#[must_use]
pub fn parse_bound(raw: &str) -> Option<Timestamp> {
    if let Ok(ts) = Timestamp::parse(raw) {
        return Some(ts);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Timestamp::from_datetime(dt.and_utc()));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Timestamp::from_datetime(dt.and_utc()))
}

/// Which page of results to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// Records per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// 1-based page number.
    #[serde(default = "first_page")]
    pub page: u32,
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

fn first_page() -> u32 {
    1
}

impl PageRequest {
    /// Create a page request.
    #[must_use]
    pub const fn new(per_page: u32, page: u32) -> Self {
        Self { per_page, page }
    }

    /// The first page of the given size.
    #[must_use]
    pub const fn first(per_page: u32) -> Self {
        Self { per_page, page: 1 }
    }

    /// Number of records to skip.
    #[must_use]
    pub fn offset(&self) -> usize {
        let skipped = u64::from(self.page.saturating_sub(1)).saturating_mul(u64::from(self.per_page));
        usize::try_from(skipped).unwrap_or(usize::MAX)
    }

    /// Number of records to return.
    #[must_use]
    pub fn limit(&self) -> usize {
        usize::try_from(self.per_page).unwrap_or(usize::MAX)
    }

    /// Check the bounds.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `per_page` is outside `1..=max_per_page`
    /// or `page` is zero.
    pub fn validate(&self, max_per_page: u32) -> AuditResult<()> {
        self.violations(max_per_page).into_result()
    }

    pub(crate) fn violations(&self, max_per_page: u32) -> Violations {
        let mut violations = Violations::default();
        if self.per_page == 0 || self.per_page > max_per_page {
            violations.push(
                "per_page",
                format!("must be between 1 and {max_per_page}"),
            );
        }
        if self.page == 0 {
            violations.push("page", "must be at least 1");
        }
        violations
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PER_PAGE)
    }
}

/// Deterministic cache key for a filter and page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// The key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
