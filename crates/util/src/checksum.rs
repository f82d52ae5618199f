//! Content checksums.
//!
//! Workflow checksums are computed over canonical JSON (object keys sorted, no insignificant
//! whitespace) so that two definitions that differ only in key order hash identically.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialize `value` as canonical JSON.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    let mut output = String::new();
    write_canonical(&value, &mut output)?;
    Ok(output)
}

fn write_canonical(value: &Value, output: &mut String) -> Result<(), serde_json::Error> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            output.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    output.push(',');
                }
                output.push_str(&serde_json::to_string(key)?);
                output.push(':');
                write_canonical(&map[key.as_str()], output)?;
            }
            output.push('}');
        }
        Value::Array(items) => {
            output.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    output.push(',');
                }
                write_canonical(item, output)?;
            }
            output.push(']');
        }
        scalar => output.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

/// Hex-encoded SHA-256 of raw bytes.
pub fn checksum_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hex-encoded SHA-256 of the canonical JSON form of `value`.
pub fn checksum_value<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(checksum_bytes(canonical_json(value)?.as_bytes()))
}
