//! Prelude module - commonly used test helpers.

pub use crate::fixtures::{
    EPOCH, auth_login, payment_purchase, submission, test_address, test_timestamp,
};
pub use crate::harness::{TestLog, setup_test_logging, test_config_file};
