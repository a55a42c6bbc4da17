//! Chronicle Telemetry - logging setup for the Chronicle audit log.
//!
//! Wraps `tracing-subscriber` with a serializable [`LogConfig`]: a base
//! level plus per-target directives, four output formats, and stdout,
//! stderr or rolling-file targets.
//!
//! # Example
//!
//! ```rust,no_run
//! use chronicle_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), chronicle_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("chronicle_audit=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("audit log ready");
//! # Ok(())
//! # }
//! ```
//!
//! With the `config` feature, [`LogConfig::from_section`] builds a config
//! from the `[logging]` section of a `chronicle_config::Config`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, file_appender,
    setup_default_logging, setup_logging, subscriber_with_writer,
};
