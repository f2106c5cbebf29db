//! Human-supplied anchors: the boundary condition for label propagation
//! ("anchors: per-community positive and negative tags with polarity
//! and confidence").

use std::collections::BTreeMap;

use crate::types::{AccountId, CommunitySeed, GraphHash, Polarity, TagAssignment};

/// Per-community positive/negative anchor accounts, grouped and ready for
/// [`crate::propagation::PropagationEngine::propagate`].
///
/// Community keys are kept in sorted order so the resulting index (used as
/// `MembershipMatrix::community_keys`) is deterministic for a given set of
/// tag keys, independent of write order.
#[derive(Debug, Clone, Default)]
pub struct AnchorSet {
    communities: Vec<String>,
    positive: BTreeMap<String, BTreeMap<AccountId, f32>>,
    negative: BTreeMap<String, BTreeMap<AccountId, f32>>,
}

impl AnchorSet {
    /// Build an anchor set from a flat list of workspace tag assignments,
    /// one read from `Store::list_tag_assignments` per ego ("anchors").
    /// Last-writer-wins is assumed already resolved by the store; if two
    /// assignments for the same (account, tag) slot are passed here, the
    /// later one in iteration order wins.
    pub fn from_tag_assignments(assignments: impl IntoIterator<Item = TagAssignment>) -> Self {
        let mut set = Self::default();
        for assignment in assignments {
            set.insert(
                assignment.key.tag_key,
                assignment.key.account_id,
                assignment.polarity,
                assignment.confidence,
            );
        }
        set
    }

    fn insert(&mut self, community: String, account: AccountId, polarity: Polarity, confidence: f32) {
        if !self.communities.contains(&community) {
            self.communities.push(community.clone());
            self.communities.sort();
        }
        let confidence = confidence.clamp(0.0, 1.0);
        match polarity {
            Polarity::In => {
                self.negative.entry(community.clone()).or_default().remove(&account);
                self.positive.entry(community).or_default().insert(account, confidence);
            }
            Polarity::NotIn => {
                self.positive.entry(community.clone()).or_default().remove(&account);
                self.negative.entry(community).or_default().insert(account, confidence);
            }
        }
    }

    /// Blend a curator `CommunitySeed`'s soft prior weights in as
    /// additional positive anchor mass for members not already explicitly
    /// tagged (explicit human tags always take precedence).
    pub fn merge_community_seed(&mut self, seed: &CommunitySeed) {
        if !self.communities.contains(&seed.tag_key) {
            self.communities.push(seed.tag_key.clone());
            self.communities.sort();
        }
        let positive = self.positive.entry(seed.tag_key.clone()).or_default();
        for (account, &weight) in &seed.prior_weights {
            positive.entry(account.clone()).or_insert(weight.clamp(0.0, 1.0));
        }
    }

    /// Community keys in deterministic (sorted) index order.
    pub fn communities(&self) -> &[String] {
        &self.communities
    }

    /// Number of positive anchors for a community (`|Cc|`).
    pub fn positive_count(&self, community: &str) -> usize {
        self.positive.get(community).map(|m| m.len()).unwrap_or(0)
    }

    /// `true` if this account carries at least one anchor (positive or
    /// negative) anywhere, i.e. belongs to the labeled set `L`.
    pub fn is_labeled(&self, account: &AccountId) -> bool {
        self.positive.values().any(|m| m.contains_key(account))
            || self.negative.values().any(|m| m.contains_key(account))
    }

    /// Raw prior weight `mu_i^c`: the positive-anchor confidence if tagged
    /// positive for `community`, `0.0` if tagged negative or untagged.
    pub fn mu(&self, account: &AccountId, community: &str) -> f32 {
        self.positive
            .get(community)
            .and_then(|m| m.get(account))
            .copied()
            .unwrap_or(0.0)
    }

    /// Drop every community key for which `keep` returns `false`, along
    /// with its positive/negative anchor rows (Failure semantics:
    /// "if no positive anchors exist for some community, it is dropped").
    pub fn retain_communities(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.communities.retain(|c| keep(c));
        self.positive.retain(|c, _| keep(c));
        self.negative.retain(|c, _| keep(c));
    }

    /// Communities with zero positive anchors, dropped with a warning.
    pub fn communities_without_positive_anchors(&self) -> Vec<String> {
        self.communities
            .iter()
            .filter(|c| self.positive_count(c) == 0)
            .cloned()
            .collect()
    }

    /// Deterministic content hash of this anchor set, used as the
    /// `version_key` component for the produced `MembershipMatrix`.
    pub fn content_hash(&self) -> GraphHash {
        let mut rows: Vec<(String, String, bool, String)> = Vec::new();
        for (community, members) in &self.positive {
            for (account, confidence) in members {
                rows.push((community.clone(), account.to_string(), true, confidence.to_bits().to_string()));
            }
        }
        for (community, members) in &self.negative {
            for (account, confidence) in members {
                rows.push((community.clone(), account.to_string(), false, confidence.to_bits().to_string()));
            }
        }
        rows.sort();
        GraphHash::compute(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagAssignment;

    fn tag(account: &str, community: &str, polarity: Polarity, confidence: f32) -> TagAssignment {
        TagAssignment::new(
            "ws",
            AccountId::resolved("ego"),
            AccountId::resolved(account),
            community,
            polarity,
            confidence,
            "tester",
            0,
        )
    }

    #[test]
    fn communities_are_sorted_deterministically() {
        let set = AnchorSet::from_tag_assignments(vec![
            tag("a", "zeta", Polarity::In, 1.0),
            tag("b", "alpha", Polarity::In, 1.0),
        ]);
        assert_eq!(set.communities(), &["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn negative_anchor_zeroes_positive_mu() {
        let set = AnchorSet::from_tag_assignments(vec![tag("a", "x", Polarity::NotIn, 0.9)]);
        assert_eq!(set.mu(&AccountId::resolved("a"), "x"), 0.0);
        assert!(set.is_labeled(&AccountId::resolved("a")));
    }

    #[test]
    fn positive_then_negative_overwrites_mass() {
        let mut set = AnchorSet::default();
        set.insert("x".into(), AccountId::resolved("a"), Polarity::In, 1.0);
        set.insert("x".into(), AccountId::resolved("a"), Polarity::NotIn, 1.0);
        assert_eq!(set.mu(&AccountId::resolved("a"), "x"), 0.0);
        assert_eq!(set.positive_count("x"), 0);
    }

    #[test]
    fn communities_without_positive_anchors_are_flagged() {
        let set = AnchorSet::from_tag_assignments(vec![tag("a", "x", Polarity::NotIn, 0.9)]);
        assert_eq!(set.communities_without_positive_anchors(), vec!["x".to_string()]);
    }

    #[test]
    fn content_hash_is_deterministic() {
        let a = AnchorSet::from_tag_assignments(vec![tag("a", "x", Polarity::In, 0.5)]);
        let b = AnchorSet::from_tag_assignments(vec![tag("a", "x", Polarity::In, 0.5)]);
        assert_eq!(a.content_hash(), b.content_hash());
    }
}
