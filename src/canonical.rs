//! Canonical serialization for deterministic hashing.
//!
//! Functions here serialize data in a canonical, deterministic format
//! suitable for hashing and cache-key derivation.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order.
//! - Stable Vec order: vectors serialize in index order; callers sort
//!   before hashing whenever order is not already canonical (e.g. BTreeMap
//!   keys, sorted id lists).
//! - No `HashMap` in hashed data: use `BTreeMap` so iteration order is
//!   stable across runs.

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = to_canonical_bytes(value);
    xxh64(&bytes, 0)
}

/// Compute canonical hash and return as a hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestStruct {
        name: String,
        value: i32,
    }

    #[test]
    fn test_determinism() {
        let s = TestStruct {
            name: "test".to_string(),
            value: 42,
        };

        let h1 = canonical_hash(&s);
        let h2 = canonical_hash(&s);
        assert_eq!(h1, h2);
    }
}
