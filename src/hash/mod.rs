//! Canonical hashing of tool invocations.
//!
//! The dedupe key for a tool call is a SHA-256 digest over
//! `"{tool}|{canonical_json(params)}"`. Two parameter objects that are
//! deep-equal but differ in key order hash identically; parameter values
//! that differ only in number spelling (`1.50` vs `1.5`) do not.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest identifying a `(tool, params)` pair.
///
/// Used both as the cache key of the deduplicator and as the `turn_id`
/// recorded on tool results.
pub fn dedupe_key(tool: &str, params: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool.as_bytes());
    hasher.update(b"|");
    hasher.update(canonical_json(params).as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonical textual form of a JSON value.
///
/// Object keys are emitted in lexicographic order, array order is
/// preserved, and numbers keep their source lexical form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn key_order_does_not_change_digest() {
        let a: Value = serde_json::from_str(r#"{"a": 2, "b": 3}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": 3, "a": 2}"#).unwrap();
        assert_eq!(dedupe_key("add", &a), dedupe_key("add", &b));
    }

    #[test]
    fn nested_key_order_does_not_change_digest() {
        let a: Value =
            serde_json::from_str(r#"{"outer": {"x": 1, "y": [1, 2]}, "z": null}"#).unwrap();
        let b: Value =
            serde_json::from_str(r#"{"z": null, "outer": {"y": [1, 2], "x": 1}}"#).unwrap();
        assert_eq!(dedupe_key("t", &a), dedupe_key("t", &b));
    }

    #[test]
    fn array_order_changes_digest() {
        let a = json!({"items": [1, 2]});
        let b = json!({"items": [2, 1]});
        assert_ne!(dedupe_key("t", &a), dedupe_key("t", &b));
    }

    #[test]
    fn tool_name_changes_digest() {
        let params = json!({"a": 1});
        assert_ne!(dedupe_key("alpha", &params), dedupe_key("beta", &params));
    }

    #[test]
    fn number_lexical_form_is_preserved() {
        let short: Value = serde_json::from_str(r#"{"v": 1.5}"#).unwrap();
        let long: Value = serde_json::from_str(r#"{"v": 1.50}"#).unwrap();
        assert_eq!(canonical_json(&short), r#"{"v":1.5}"#);
        assert_eq!(canonical_json(&long), r#"{"v":1.50}"#);
        assert_ne!(dedupe_key("t", &short), dedupe_key("t", &long));
    }

    #[test]
    fn canonical_form_sorts_keys_and_escapes_strings() {
        let value: Value =
            serde_json::from_str("{\"b\": \"line\\nbreak\", \"a\": \"quote\\\"\"}").unwrap();
        assert_eq!(
            canonical_json(&value),
            r#"{"a":"quote\"","b":"line\nbreak"}"#
        );
    }

    #[test]
    fn scalars_are_literal() {
        assert_eq!(canonical_json(&Value::Null), "null");
        assert_eq!(canonical_json(&json!(true)), "true");
        assert_eq!(canonical_json(&json!(false)), "false");
        assert_eq!(canonical_json(&json!([])), "[]");
        assert_eq!(canonical_json(&json!({})), "{}");
    }

    #[test]
    fn digest_is_hex_encoded_sha256() {
        let key = dedupe_key("add", &json!({"a": 2, "b": 3}));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
