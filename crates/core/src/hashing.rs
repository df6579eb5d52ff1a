//! Shared SHA-256 hex digest utility.
//!
//! Used by the mapping cache (payload fingerprints) and the repair ledger
//! (integrity hash chain).

use sha2::{Digest, Sha256};

use crate::types::Payload;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Deterministic fingerprint of a payload.
///
/// `serde_json::Map` keeps keys sorted, so two payloads with the same content
/// serialize to the same bytes regardless of insertion order.
pub fn fingerprint(payload: &Payload) -> String {
    let canonical = serde_json::to_vec(payload).unwrap_or_default();
    sha256_hex(&canonical)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let mut a = Payload::new();
        a.insert("id".into(), json!(1));
        a.insert("email".into(), json!("a@example.com"));
        let mut b = Payload::new();
        b.insert("email".into(), json!("a@example.com"));
        b.insert("id".into(), json!(1));
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let mut a = Payload::new();
        a.insert("id".into(), json!(1));
        let mut b = a.clone();
        b.insert("id".into(), json!(2));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
