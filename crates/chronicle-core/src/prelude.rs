//! Prelude module - commonly used types for convenient import.
//!
//! Use `use chronicle_core::prelude::*;` to import all essential types.

// Identifiers and time
pub use crate::{RecordId, Timestamp};

// Clocks
pub use crate::{Clock, ManualClock, SystemClock};

// Payload values
pub use crate::{Map, Value};
