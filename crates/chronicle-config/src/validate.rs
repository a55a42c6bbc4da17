//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Hard ceiling on `search.max_per_page`.
pub const MAX_PER_PAGE_UPPER_BOUND: u32 = 1000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_search(config)?;
    validate_export(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message,
    }
}

fn validate_search(config: &Config) -> ConfigResult<()> {
    let s = &config.search;

    if s.max_per_page == 0 || s.max_per_page > MAX_PER_PAGE_UPPER_BOUND {
        return Err(invalid(
            "search.max_per_page",
            format!(
                "{} is out of range; must be between 1 and {MAX_PER_PAGE_UPPER_BOUND}",
                s.max_per_page
            ),
        ));
    }

    if s.default_per_page == 0 || s.default_per_page > s.max_per_page {
        return Err(invalid(
            "search.default_per_page",
            format!(
                "{} is out of range; must be between 1 and max_per_page ({})",
                s.default_per_page, s.max_per_page
            ),
        ));
    }

    Ok(())
}

fn validate_export(config: &Config) -> ConfigResult<()> {
    if config.export.page_limit == 0 {
        return Err(invalid(
            "export.page_limit",
            "must be at least 1".to_owned(),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !LOG_LEVELS.contains(&l.level.to_lowercase().as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected one of: {}",
                l.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if !LOG_FORMATS.contains(&l.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: {}",
                l.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }

    Ok(())
}
