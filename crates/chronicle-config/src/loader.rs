//! Layered configuration loading.
//!
//! 1. Parse the embedded `defaults.toml`
//! 2. Merge the config file, if one was given and exists
//! 3. Apply `CHRONICLE_*` env fallbacks for fields the file left unset
//! 4. Deserialize the merged tree and validate it

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_all_leaves};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A loaded configuration together with where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The validated configuration.
    pub config: Config,
    /// Dotted field path to the layer that supplied it.
    pub field_sources: FieldSources,
    /// Config files that were actually read, in merge order.
    pub loaded_files: Vec<String>,
}

/// Load configuration from the defaults, an optional file, and the process
/// environment.
///
/// A missing file is skipped, not an error.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is unreadable or malformed, an env
/// var does not parse, or the merged configuration fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    load_with_env(path, &collect_env_vars())
}

/// Like [`load`], with an explicit set of environment variables.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env<S: ::std::hash::BuildHasher>(
    path: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_all_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    if let Some(path) = path {
        if let Some(overlay) = try_load_file(path)? {
            let name = path.display().to_string();
            deep_merge_tracking(
                &mut merged,
                &overlay,
                "",
                &ConfigLayer::File(name.clone()),
                &mut field_sources,
            );
            info!(path = %name, "loaded config file");
            loaded_files.push(name);
        }
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering, no env).
///
/// Fields the file omits take their `Default` values.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or
/// validated.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let Some(value) = try_load_file(path)? else {
        return Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    };

    let config: Config =
        value
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: path.display().to_string(),
                source: e,
            })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if size > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {size} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_only() {
        let resolved = load_with_env(None, &no_env()).unwrap();
        assert_eq!(resolved.config.cache.ttl_secs, 300);
        assert_eq!(resolved.config.search.default_per_page, 15);
        assert_eq!(resolved.config.search.max_per_page, 100);
        assert_eq!(resolved.config.export.page_limit, 1000);
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("cache.ttl_secs"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let resolved =
            load_with_env(Some(&dir.path().join("absent.toml")), &no_env()).unwrap();
        assert!(resolved.loaded_files.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = write_config("[cache]\nttl_secs = 60\n\n[search]\nmax_per_page = 50\n");
        let resolved = load_with_env(Some(file.path()), &no_env()).unwrap();

        assert_eq!(resolved.config.cache.ttl_secs, 60);
        assert_eq!(resolved.config.search.max_per_page, 50);
        assert_eq!(resolved.config.search.default_per_page, 15);
        assert_eq!(resolved.loaded_files.len(), 1);
        assert!(matches!(
            resolved.field_sources.get("cache.ttl_secs"),
            Some(ConfigLayer::File(_))
        ));
    }

    #[test]
    fn test_env_is_fallback_only() {
        let file = write_config("[cache]\nttl_secs = 60\n");
        let env: HashMap<String, String> = [
            ("CHRONICLE_CACHE_TTL_SECS".to_owned(), "5".to_owned()),
            ("CHRONICLE_EXPORT_PAGE_LIMIT".to_owned(), "250".to_owned()),
        ]
        .into_iter()
        .collect();

        let resolved = load_with_env(Some(file.path()), &env).unwrap();
        assert_eq!(resolved.config.cache.ttl_secs, 60);
        assert_eq!(resolved.config.export.page_limit, 250);
        assert_eq!(
            resolved.field_sources.get("export.page_limit"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let file = write_config("[cache\nttl_secs = ");
        let err = load_with_env(Some(file.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let file = write_config("[search]\ndefault_per_page = 500\n");
        let err = load_with_env(Some(file.path()), &no_env()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { ref field, .. } if field == "search.default_per_page"
        ));
    }

    #[test]
    fn test_negative_ttl_is_rejected() {
        let file = write_config("[cache]\nttl_secs = -1\n");
        let err = load_with_env(Some(file.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_load_file_without_layering() {
        let file = write_config("[export]\npage_limit = 10\n");
        let config = load_file(file.path()).unwrap();
        assert_eq!(config.export.page_limit, 10);

        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
