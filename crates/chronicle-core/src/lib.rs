//! Chronicle Core - Foundation types for the Chronicle audit log.
//!
//! This crate provides:
//! - Identifier and timestamp newtypes shared by every other crate
//! - The [`Value`] tree used for open-ended record payloads
//! - The [`Clock`] abstraction that time-dependent components are built on
//!
//! # Example
//!
//! ```
//! use chronicle_core::{Clock, ManualClock, Timestamp, Value};
//!
//! let clock = ManualClock::starting_at(Timestamp::parse("2024-01-15T10:00:00Z").unwrap());
//! let payload = Value::from(serde_json::json!({ "browser": "Chrome" }));
//!
//! assert_eq!(payload.get("browser"), Some(&Value::from("Chrome")));
//! assert_eq!(clock.now().to_rfc3339(), "2024-01-15T10:00:00.000000Z");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod clock;
mod types;
mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use types::{RecordId, Timestamp};
pub use value::{Map, Value};
