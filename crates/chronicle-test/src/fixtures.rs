//! Fixtures for common submissions.

use std::net::{IpAddr, Ipv4Addr};

use chronicle_audit::NewLogRecord;
use chronicle_core::Timestamp;

/// Start time of the harness clock.
pub const EPOCH: &str = "2024-01-15T10:00:00Z";

/// The harness clock's start time as a [`Timestamp`].
///
/// # Panics
///
/// Never; [`EPOCH`] is a valid RFC 3339 string.
#[must_use]
pub fn test_timestamp() -> Timestamp {
    Timestamp::parse(EPOCH).expect("EPOCH is valid RFC 3339")
}

/// Loopback address used by every fixture.
#[must_use]
pub fn test_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// A submission with the given system and action and fixed other fields.
#[must_use]
pub fn submission(system: &str, action: &str) -> NewLogRecord {
    NewLogRecord::new("123", system, action, "user", "success", test_address())
}

/// User 123 logging in successfully.
#[must_use]
pub fn auth_login() -> NewLogRecord {
    submission("auth", "login")
}

/// User 123 making a purchase, with an order payload.
#[must_use]
pub fn payment_purchase() -> NewLogRecord {
    let payload = serde_json::json!({
        "order_id": 1042,
        "amount": 19.99,
        "currency": "EUR",
        "items": ["sku-1", "sku-2"],
    });
    let payload = match chronicle_core::Value::from(payload) {
        chronicle_core::Value::Map(map) => map,
        _ => chronicle_core::Map::new(),
    };
    NewLogRecord::new("123", "payment", "purchase", "order", "success", test_address())
        .with_payload(payload)
}
