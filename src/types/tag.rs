//! Human-authored tag assignments and community seeds.
//!
//! These are owned by the `Store` port; the core holds a workspace-scoped
//! read-through view (see [`crate::store::Store`]) that invalidates on
//! write.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::account::AccountId;

/// Whether a tag assignment includes or excludes the account from the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    /// Account is a positive member of the tag/community.
    In,
    /// Account is explicitly excluded from the tag/community.
    NotIn,
}

/// A unique key identifying a tag assignment slot.
///
/// Assignments are unique per (workspace, ego, account, tag key); repeated
/// writes overwrite with last-writer-wins and update the timestamp.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagAssignmentKey {
    pub workspace_id: String,
    pub ego_id: AccountId,
    pub account_id: AccountId,
    pub tag_key: String,
}

/// A single human-authored tag assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagAssignment {
    pub key: TagAssignmentKey,
    pub polarity: Polarity,
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Who made this assignment.
    pub actor: String,
    /// Unix timestamp of the last write.
    pub timestamp: i64,
    /// Additional, unopinionated tag dimensions (the "lucidity axis" open
    /// question): consumed by `PropagationEngine` only if the caller
    /// explicitly requests them as extra anchor classes. No semantics are
    /// assigned to entries here by the core itself.
    pub extra_dimensions: Vec<(String, f32)>,
}

impl TagAssignment {
    pub fn new(
        workspace_id: impl Into<String>,
        ego_id: AccountId,
        account_id: AccountId,
        tag_key: impl Into<String>,
        polarity: Polarity,
        confidence: f32,
        actor: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            key: TagAssignmentKey {
                workspace_id: workspace_id.into(),
                ego_id,
                account_id,
                tag_key: tag_key.into(),
            },
            polarity,
            confidence: confidence.clamp(0.0, 1.0),
            actor: actor.into(),
            timestamp,
            extra_dimensions: Vec::new(),
        }
    }

    /// Apply last-writer-wins semantics: `incoming` overwrites `self` only
    /// if its timestamp is at least as recent.
    pub fn merge_last_writer_wins(&mut self, incoming: TagAssignment) {
        if incoming.timestamp >= self.timestamp {
            *self = incoming;
        }
    }
}

/// A curator-defined community with soft prior weights over members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunitySeed {
    /// Tag key identifying this community.
    pub tag_key: String,
    /// Curator-assigned color (e.g. a hex string), for display only.
    pub color: Option<String>,
    /// Curator-assigned label.
    pub label: String,
    /// Soft prior weight per member account, used as `mu_i^c` when building
    /// the propagation boundary matrix.
    pub prior_weights: BTreeMap<AccountId, f32>,
}

impl CommunitySeed {
    pub fn new(tag_key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            tag_key: tag_key.into(),
            color: None,
            label: label.into(),
            prior_weights: BTreeMap::new(),
        }
    }

    pub fn with_member(mut self, account: AccountId, weight: f32) -> Self {
        self.prior_weights.insert(account, weight.clamp(0.0, 1.0));
        self
    }
}
