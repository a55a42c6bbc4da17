//! Configuration types.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Query cache settings.
    pub cache: CacheSection,
    /// Interactive search limits.
    pub search: SearchSection,
    /// Export limits.
    pub export: ExportSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

/// Query cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Seconds a cached search page is served. Zero disables caching.
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

/// Interactive search limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// Page size used when the caller does not ask for one.
    pub default_per_page: u32,
    /// Largest page size a caller may request.
    pub max_per_page: u32,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            default_per_page: 15,
            max_per_page: 100,
        }
    }
}

/// Export limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    /// Number of records a single export covers.
    pub page_limit: u32,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self { page_limit: 1000 }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level filter (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format (`pretty`, `compact`, `json`, `full`).
    pub format: String,
    /// Per-target directives such as `chronicle_audit=debug`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}
