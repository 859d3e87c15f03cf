//! Canonical encoding and hashing used by the consensus engine's
//! `proof_hash = SHA-256(canonical_encoding(proof))` (`spec.md` §4.5) and by
//! the workflow's idempotency check (`spec.md` §4.6).

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serialize `value` to JSON with sorted object keys, so that two
/// logically-equal values always produce the same bytes regardless of
/// field declaration order or `HashMap` iteration order.
pub fn canonical_encode<T: Serialize>(value: &T) -> Vec<u8> {
    let v = serde_json::to_value(value).expect("value must be JSON-serializable");
    let sorted = sort_value(v);
    serde_json::to_vec(&sorted).expect("sorted value must re-serialize")
}

fn sort_value(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), sort_value(map[&k].clone()));
            }
            Value::Object(sorted)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_value).collect()),
        other => other,
    }
}

/// 32-byte SHA-256 digest over the canonical encoding of `value`.
pub fn proof_hash<T: Serialize>(value: &T) -> [u8; 32] {
    let bytes = canonical_encode(value);
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_encode_is_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_encode(&a), canonical_encode(&b));
    }

    #[test]
    fn proof_hash_is_deterministic() {
        let v = json!({"axioms": ["x"], "conclusion": "y"});
        assert_eq!(proof_hash(&v), proof_hash(&v));
    }
}
