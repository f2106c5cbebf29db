//! Deterministic 128-bit graph content hash.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::xxh3_128;

use crate::canonical::to_canonical_bytes;

/// A deterministic 128-bit content hash of a loaded graph.
///
/// Used as a cache salt ("all caches are keyed on a structural hash of
/// normalized inputs") and as the snapshot validator: a [`Snapshot`]'s
/// manifest `source_graph_hash` must equal the hash of the currently-loaded
/// graph or downstream calls return `CoreError::Stale`.
///
/// [`Snapshot`]: crate::spectral::Snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphHash(u128);

impl GraphHash {
    /// Compute the hash of a canonically-serializable value.
    pub fn compute<T: Serialize>(value: &T) -> Self {
        let bytes = to_canonical_bytes(value);
        Self(xxh3_128(&bytes))
    }

    /// Render as a fixed-width hex string.
    pub fn to_hex(self) -> String {
        format!("{:032x}", self.0)
    }

    /// Parse from a hex string previously produced by [`to_hex`](Self::to_hex).
    pub fn from_hex(s: &str) -> Option<Self> {
        u128::from_str_radix(s, 16).ok().map(Self)
    }
}

impl fmt::Display for GraphHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_input_yields_identical_hash() {
        let a = GraphHash::compute(&vec!["x", "y", "z"]);
        let b = GraphHash::compute(&vec!["x", "y", "z"]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_yields_different_hash() {
        let a = GraphHash::compute(&vec!["x", "y"]);
        let b = GraphHash::compute(&vec!["x", "y", "z"]);
        assert_ne!(a, b);
    }

    #[test]
    fn hex_round_trips() {
        let h = GraphHash::compute(&"anything");
        let parsed = GraphHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }
}
