//! Per-account community membership vectors produced by label propagation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::account::AccountId;

/// Dense membership distribution over `K` communities plus the abstain class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipVector {
    pub account_id: AccountId,
    /// Weights over the `K` named communities, in community-index order.
    pub weights: Vec<f32>,
    /// Weight on the `(K+1)`-th "none"/abstain column.
    pub none_weight: f32,
    /// Shannon entropy of the full (K+1)-length distribution.
    pub entropy: f32,
    /// Degree-based uncertainty term, `1/sqrt(deg+1)`.
    pub degree_uncertainty: f32,
    /// Combined uncertainty: `w_entropy * entropy + w_degree * degree_uncertainty`.
    pub uncertainty: f32,
    /// Set when `max(weights) < abstain_confidence` or `uncertainty > abstain_uncertainty`.
    pub abstain: bool,
}

impl MembershipVector {
    /// Sum of `weights` plus `none_weight`; must be `1 ± 1e-6`.
    pub fn row_sum(&self) -> f32 {
        self.weights.iter().sum::<f32>() + self.none_weight
    }

    /// The community index (if any) with the highest weight, and that weight.
    pub fn argmax(&self) -> Option<(usize, f32)> {
        self.weights
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, w)| (i, *w))
    }
}

/// A full propagation run's output: one [`MembershipVector`] per account,
/// versioned by the inputs that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipMatrix {
    /// Community keys in index order, matching `MembershipVector::weights`.
    pub community_keys: Vec<String>,
    /// Rows, keyed by account for O(log n) lookup.
    pub rows: BTreeMap<AccountId, MembershipVector>,
    /// `(graph_hash, anchors_hash, config_hash)`, the cache/versioning key.
    pub version_key: String,
}

impl MembershipMatrix {
    pub fn get(&self, account: &AccountId) -> Option<&MembershipVector> {
        self.rows.get(account)
    }

    /// The index of a community by its key, if present.
    pub fn community_index(&self, key: &str) -> Option<usize> {
        self.community_keys.iter().position(|k| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_sum_includes_none_weight() {
        let v = MembershipVector {
            account_id: AccountId::resolved("a"),
            weights: vec![0.3, 0.3],
            none_weight: 0.4,
            entropy: 0.0,
            degree_uncertainty: 0.0,
            uncertainty: 0.0,
            abstain: false,
        };
        assert!((v.row_sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn argmax_picks_highest_weight() {
        let v = MembershipVector {
            account_id: AccountId::resolved("a"),
            weights: vec![0.1, 0.7, 0.2],
            none_weight: 0.0,
            entropy: 0.0,
            degree_uncertainty: 0.0,
            uncertainty: 0.0,
            abstain: false,
        };
        assert_eq!(v.argmax(), Some((1, 0.7)));
    }
}
