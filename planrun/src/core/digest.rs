//! Deterministic short digests over JSON values.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest.
pub const DIGEST_LEN: usize = 16;

/// SHA-256 of the canonical JSON encoding of `value`, truncated to 16 hex chars.
///
/// Canonical means object keys sorted at every depth and no insignificant
/// whitespace, so key insertion order never changes the digest.
pub fn digest(value: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);
    let hash = Sha256::digest(canonical.as_bytes());
    let mut encoded = hex::encode(hash);
    encoded.truncate(DIGEST_LEN);
    encoded
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn digest_is_sixteen_lowercase_hex_chars() {
        let d = digest(&json!({"path": "test.txt"}));
        assert_eq!(d.len(), DIGEST_LEN);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": [1, 2], "x": null}}"#)
            .expect("parse");
        let b: Value = serde_json::from_str(r#"{"a": {"x": null, "y": [1, 2]}, "b": 1}"#)
            .expect("parse");
        assert_eq!(digest(&a), digest(&b));
    }

    #[test]
    fn different_values_differ() {
        assert_ne!(digest(&json!({"a": 1})), digest(&json!({"a": 2})));
        assert_ne!(digest(&json!([1, 2])), digest(&json!([2, 1])));
    }

    #[test]
    fn matches_sorted_compact_encoding() {
        let expected = hex::encode(Sha256::digest(br#"{"a":1,"b":"x"}"#));
        assert_eq!(digest(&json!({"b": "x", "a": 1})), expected[..DIGEST_LEN]);
    }
}
