//! Directed follow-graph edges.

use serde::{Deserialize, Serialize};
use super::account::{AccountId, Provenance};

/// Direction of a follow edge as recorded by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Source follows target.
    Outbound,
    /// Target follows source.
    Inbound,
    /// Derived: both directions observed.
    MutualDerived,
}

/// A single directed edge in the follow graph.
///
/// Canonical ordering is (source, target, direction), matching the
/// dedup key used by `GraphStore::load`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Follower/source account.
    pub source: AccountId,
    /// Followed/target account.
    pub target: AccountId,
    /// Edge direction.
    pub direction: Direction,
    /// Where this edge was observed.
    pub provenance: Provenance,
    /// Optional edge weight (e.g. interaction frequency).
    pub weight: Option<f32>,
    /// Unix timestamp this record was fetched, used for dedup tie-breaks.
    pub fetched_at: i64,
}

impl Edge {
    /// Create a new edge with default (outbound) direction and no weight.
    pub fn new(source: AccountId, target: AccountId, provenance: Provenance, fetched_at: i64) -> Self {
        Self {
            source,
            target,
            direction: Direction::Outbound,
            provenance,
            weight: None,
            fetched_at,
        }
    }

    /// The dedup key: (source, target, direction). On conflict, the loader
    /// keeps the record with the latest `fetched_at`.
    pub fn dedup_key(&self) -> (AccountId, AccountId, Direction) {
        (self.source.clone(), self.target.clone(), self.direction)
    }
}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.source, &self.target, self.direction).cmp(&(&other.source, &other.target, other.direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_ignores_weight_and_timestamp() {
        let a = Edge {
            source: AccountId::resolved("1"),
            target: AccountId::resolved("2"),
            direction: Direction::Outbound,
            provenance: Provenance::Archive,
            weight: Some(1.0),
            fetched_at: 100,
        };
        let b = Edge {
            fetched_at: 200,
            weight: None,
            ..a.clone()
        };
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
