//! Canonical byte encoding of [`Value`] trees.
//!
//! Format (v1):
//! - 1 byte: version (`CANONICAL_VERSION`)
//! - the encoded root value
//!
//! Each value is a tag byte followed by its payload:
//!
//! | Tag | Variant | Payload |
//! |-----|---------|---------|
//! | `n` | null | none |
//! | `b` | bool | 1 byte, `0x00` or `0x01` |
//! | `i` | integer | 8 bytes, big-endian two's complement |
//! | `f` | float | length-prefixed normalized text (see [`normalize_float`]) |
//! | `s` | string | length-prefixed UTF-8 |
//! | `l` | list | 8-byte count, then each element in order |
//! | `m` | map | 8-byte count, then each length-prefixed key and its value, keys in byte order |
//!
//! Lengths and counts are u64 little-endian. Because every value is tagged
//! and every variable-length item is prefixed, no two distinct trees share
//! an encoding: the string `"1"`, the integer `1` and the float `1.0` all
//! encode differently.

use chronicle_core::Value;

/// Version byte prefixed to every canonical encoding.
pub const CANONICAL_VERSION: u8 = 0x01;

const TAG_NULL: u8 = b'n';
const TAG_BOOL: u8 = b'b';
const TAG_INTEGER: u8 = b'i';
const TAG_FLOAT: u8 = b'f';
const TAG_STRING: u8 = b's';
const TAG_LIST: u8 = b'l';
const TAG_MAP: u8 = b'm';

/// Encode a value into its canonical byte form.
///
/// Pure and infallible: equal values always produce equal bytes, regardless
/// of the order in which map entries were inserted.
#[must_use]
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    buf.push(CANONICAL_VERSION);
    encode_value(&mut buf, value);
    buf
}

/// Normalize a float to its canonical text.
///
/// - `-0.0` is treated as `0.0`
/// - finite values use the shortest scientific notation that parses back to
///   the same `f64`, so any two distinct values encode differently
/// - non-finite values map to the fixed tokens `nan`, `+inf` and `-inf`
#[must_use]
pub fn normalize_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f.is_sign_positive() { "+inf" } else { "-inf" }.to_string();
    }
    let f = if f == 0.0 { 0.0 } else { f };
    format!("{f:e}")
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*b));
        },
        Value::Integer(i) => {
            buf.push(TAG_INTEGER);
            buf.extend_from_slice(&i.to_be_bytes());
        },
        Value::Float(f) => {
            buf.push(TAG_FLOAT);
            write_length_prefixed(buf, normalize_float(*f).as_bytes());
        },
        Value::String(s) => {
            buf.push(TAG_STRING);
            write_length_prefixed(buf, s.as_bytes());
        },
        Value::List(items) => {
            buf.push(TAG_LIST);
            write_count(buf, items.len());
            for item in items {
                encode_value(buf, item);
            }
        },
        Value::Map(map) => {
            buf.push(TAG_MAP);
            write_count(buf, map.len());
            // BTreeMap iterates in byte order of the keys.
            for (key, item) in map {
                write_length_prefixed(buf, key.as_bytes());
                encode_value(buf, item);
            }
        },
    }
}

fn write_count(buf: &mut Vec<u8>, count: usize) {
    let count = u64::try_from(count).unwrap_or(u64::MAX);
    buf.extend_from_slice(&count.to_le_bytes());
}

fn write_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_count(buf, bytes.len());
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::Map;
    use serde_json::json;

    fn map_of(pairs: &[(&str, Value)]) -> Value {
        let mut map = Map::new();
        for (k, v) in pairs {
            map.insert((*k).to_string(), v.clone());
        }
        Value::Map(map)
    }

    #[test]
    fn test_deterministic() {
        let v = Value::from(json!({ "a": [1, "x", null], "b": { "c": 2.5 } }));
        assert_eq!(canonical_bytes(&v), canonical_bytes(&v));
    }

    #[test]
    fn test_insertion_order_independent() {
        let forward = map_of(&[
            ("actor", Value::from("123")),
            ("system", Value::from("auth")),
            ("action", Value::from("login")),
        ]);
        let reverse = map_of(&[
            ("action", Value::from("login")),
            ("system", Value::from("auth")),
            ("actor", Value::from("123")),
        ]);
        assert_eq!(canonical_bytes(&forward), canonical_bytes(&reverse));
    }

    #[test]
    fn test_type_tagging_separates_lookalikes() {
        let as_string = canonical_bytes(&Value::from("1"));
        let as_integer = canonical_bytes(&Value::Integer(1));
        let as_float = canonical_bytes(&Value::Float(1.0));
        assert_ne!(as_string, as_integer);
        assert_ne!(as_integer, as_float);
        assert_ne!(as_string, as_float);
    }

    #[test]
    fn test_length_prefix_prevents_concatenation_collisions() {
        let a = Value::from(json!(["ab", "c"]));
        let b = Value::from(json!(["a", "bc"]));
        assert_ne!(canonical_bytes(&a), canonical_bytes(&b));

        let c = map_of(&[("ab", Value::from("c"))]);
        let d = map_of(&[("a", Value::from("bc"))]);
        assert_ne!(canonical_bytes(&c), canonical_bytes(&d));
    }

    #[test]
    fn test_list_order_is_significant() {
        let a = Value::from(json!([1, 2]));
        let b = Value::from(json!([2, 1]));
        assert_ne!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn test_null_differs_from_absent() {
        let with_null = map_of(&[("payload", Value::Null)]);
        let without = map_of(&[]);
        assert_ne!(canonical_bytes(&with_null), canonical_bytes(&without));
    }

    #[test]
    fn test_version_prefix() {
        assert_eq!(canonical_bytes(&Value::Null), vec![CANONICAL_VERSION, b'n']);
    }

    #[test]
    fn test_float_normalization() {
        assert_eq!(normalize_float(-0.0), normalize_float(0.0));
        assert_eq!(normalize_float(1.5), "1.5e0");
        assert_eq!(normalize_float(19.99), "1.999e1");
        assert_ne!(normalize_float(0.3), normalize_float(0.31));
        assert_eq!(normalize_float(f64::NAN), "nan");
        assert_eq!(normalize_float(f64::INFINITY), "+inf");
        assert_eq!(normalize_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_float_digits_past_ten_places_are_kept() {
        assert_ne!(normalize_float(19.99), normalize_float(19.990_000_000_001));
        assert_ne!(normalize_float(0.1 + 0.2), normalize_float(0.3));

        let price = |p: f64| map_of(&[("amount", Value::Float(p))]);
        assert_ne!(
            canonical_bytes(&price(19.99)),
            canonical_bytes(&price(19.990_000_000_001))
        );
    }

    #[test]
    fn test_nested_maps_sorted() {
        let a = Value::from(json!({ "outer": { "z": 1, "a": 2 } }));
        let mut inner = Map::new();
        inner.insert("a".into(), Value::Integer(2));
        inner.insert("z".into(), Value::Integer(1));
        let b = map_of(&[("outer", Value::Map(inner))]);
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }
}
