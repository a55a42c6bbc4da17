//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: a `CHRONICLE_*` variable only
//! applies to a field that no config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources};

/// Prefix shared by every recognized variable.
pub const ENV_PREFIX: &str = "CHRONICLE_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Integer,
    Text,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: FieldKind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "CHRONICLE_CACHE_TTL_SECS",
        field_path: "cache.ttl_secs",
        kind: FieldKind::Integer,
    },
    EnvMapping {
        var_name: "CHRONICLE_SEARCH_DEFAULT_PER_PAGE",
        field_path: "search.default_per_page",
        kind: FieldKind::Integer,
    },
    EnvMapping {
        var_name: "CHRONICLE_SEARCH_MAX_PER_PAGE",
        field_path: "search.max_per_page",
        kind: FieldKind::Integer,
    },
    EnvMapping {
        var_name: "CHRONICLE_EXPORT_PAGE_LIMIT",
        field_path: "export.page_limit",
        kind: FieldKind::Integer,
    },
    EnvMapping {
        var_name: "CHRONICLE_LOG_LEVEL",
        field_path: "logging.level",
        kind: FieldKind::Text,
    },
    EnvMapping {
        var_name: "CHRONICLE_LOG_FORMAT",
        field_path: "logging.format",
        kind: FieldKind::Text,
    },
];

/// Collect the `CHRONICLE_*` variables from the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .collect()
}

/// Apply environment variable fallbacks to fields that were **not** set by
/// any config file.
///
/// Returns the number of env vars applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a numeric variable does not parse.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if matches!(sources.get(mapping.field_path), Some(ConfigLayer::File(_))) {
            continue;
        }
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };

        let value = match mapping.kind {
            FieldKind::Integer => {
                let parsed = raw.trim().parse::<i64>().map_err(|e| ConfigError::EnvError {
                    var_name: mapping.var_name.to_owned(),
                    message: format!("expected an integer: {e}"),
                })?;
                toml::Value::Integer(parsed)
            },
            FieldKind::Text => toml::Value::String(raw.clone()),
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_field(merged, mapping.field_path, value);
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    Ok(count)
}

/// Set a dotted path in a TOML tree, creating intermediate tables.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        let toml::Value::Table(table) = current else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}
