//! Deterministic dataset fingerprinting.
//!
//! Exports embed a snapshot fingerprint in their manifest; re-fetching the
//! same data later and fingerprinting it again must yield the same hash or
//! the export is not reproducible. Two in-memory representations of
//! logically identical data therefore have to hash byte-identically,
//! regardless of key insertion order or floating-point representation
//! artifacts.

use serde_json::Value;

use crate::hashing::sha256_hex;
use crate::types::Timestamp;

/// Decimal places kept when rendering non-integer numbers.
pub const FLOAT_PRECISION: usize = 6;

/// Render a JSON value in canonical form: object keys sorted, arrays in
/// order, non-integer numbers rounded to [`FLOAT_PRECISION`] decimal
/// places.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// SHA-256 hex digest of the canonical rendering of `value`.
pub fn fingerprint(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// Combine the structural checksum of `value` with a source-data
/// watermark into a single fingerprint.
pub fn fingerprint_with_watermark(value: &Value, watermark: &Timestamp) -> String {
    let material = format!("{}|{}", canonical_json(value), watermark.to_rfc3339());
    sha256_hex(material.as_bytes())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push_str(&i.to_string());
            } else if let Some(u) = n.as_u64() {
                out.push_str(&u.to_string());
            } else {
                // Finite f64 by serde_json's construction rules.
                let f = n.as_f64().unwrap_or(0.0);
                let mut rendered = format!("{f:.prec$}", prec = FLOAT_PRECISION);
                // A negative that rounds away to zero (and -0.0 itself)
                // must not keep its sign: the rendered digits alone
                // decide the canonical form.
                if rendered.starts_with('-')
                    && rendered[1..].chars().all(|c| c == '0' || c == '.')
                {
                    rendered.remove(0);
                }
                out.push_str(&rendered);
            }
        }
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
            // Sort keys for stable ordering regardless of insertion order.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

/// Write a JSON string literal with minimal escaping.
fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
