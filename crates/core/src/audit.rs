//! Integrity-hash chain and value redaction for the repair ledger.
//!
//! Kept in `core` so the ledger can be verified offline from an exported
//! snapshot without the async services.

use serde_json::Value;

use crate::hashing;

// ---------------------------------------------------------------------------
// Integrity hash chain
// ---------------------------------------------------------------------------

/// Known seed value standing in for the hash before the first record.
pub const CHAIN_SEED: &str = "REPAIR_LEDGER_CHAIN_SEED_V1";

/// SHA-256 integrity hash of one ledger record.
///
/// `prev_hash` is the previous record's hash, or `None` for the first record
/// in the chain (which uses [`CHAIN_SEED`]). `record_data` is the canonical
/// serialized form of the record's content.
pub fn compute_integrity_hash(prev_hash: Option<&str>, record_data: &str) -> String {
    let prev = prev_hash.unwrap_or(CHAIN_SEED);
    let combined = format!("{prev}|{record_data}");
    hashing::sha256_hex(combined.as_bytes())
}

// ---------------------------------------------------------------------------
// Sensitive value redaction
// ---------------------------------------------------------------------------

/// Field-name fragments whose values never enter the repair ledger.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "api_key",
    "private_key",
    "authorization",
    "credential",
];

pub const REDACTED: &str = "[REDACTED]";

pub fn is_sensitive_field(field: &str) -> bool {
    let lower = field.to_lowercase();
    SENSITIVE_FIELDS.iter().any(|f| lower.contains(f))
}

/// Redact sensitive keys in a JSON value, recursing into objects and arrays.
pub fn redact_sensitive_fields(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    let val = if is_sensitive_field(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_sensitive_fields(val)
                    };
                    (key.clone(), val)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_fields).collect()),
        other => other.clone(),
    }
}

/// The value to record for `field`: redacted outright when the field name is
/// sensitive, otherwise with nested sensitive keys redacted.
pub fn redact_field_value(field: &str, value: &Value) -> Value {
    if is_sensitive_field(field) {
        Value::String(REDACTED.to_string())
    } else {
        redact_sensitive_fields(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
