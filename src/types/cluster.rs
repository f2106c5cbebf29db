//! Cluster hierarchy types shared between the spectral snapshot and the
//! interactive cluster service.

use serde::{Deserialize, Serialize};

use super::account::AccountId;
use super::graph_hash::GraphHash;

/// A stable key identifying one cluster within one view configuration.
///
/// Used both as the `MetricsCache` key component and as the key for
/// user-assigned label overrides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterKey {
    pub snapshot_hash: GraphHash,
    /// Requested granularity (`n`) for this cut.
    pub granularity: u32,
    /// Signal-blend weight, rounded to the nearest 0.1 so the key stays
    /// stable under continuous slider input.
    pub weight_bucket: u8,
    /// Dendrogram node id this cluster corresponds to.
    pub cluster_id: u32,
}

impl ClusterKey {
    pub fn new(snapshot_hash: GraphHash, granularity: u32, weight_bucket: f32, cluster_id: u32) -> Self {
        Self {
            snapshot_hash,
            granularity,
            weight_bucket: bucket_weight(weight_bucket),
            cluster_id,
        }
    }
}

/// Round a weight in `[0, 1]` to the nearest 0.1, represented as tenths
/// (0..=10) so the key hashes/compares as a plain integer.
pub fn bucket_weight(w: f32) -> u8 {
    (w.clamp(0.0, 1.0) * 10.0).round() as u8
}

/// Where a cluster's display label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelSource {
    /// A workspace-scoped user override set via `set_label`.
    User,
    /// The default "Cluster {n}: @h1, @h2, @h3" format.
    Auto,
}

/// A node in the cut dendrogram, as served to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNode {
    /// Dendrogram node id (stable within one snapshot).
    pub id: u32,
    /// Member account ids (recursively flattened).
    pub members: Vec<AccountId>,
    /// `members.len()`.
    pub size: usize,
    /// Centroid position in embedding space.
    pub centroid: Vec<f32>,
    /// Resolved display label.
    pub label: String,
    /// Where `label` came from.
    pub label_source: LabelSource,
    /// Whether this cluster contains the request's ego account.
    pub contains_ego: bool,
    /// True if this cluster was demoted to an individual leaf
    /// (size < `MIN_CLUSTER_SIZE`).
    pub is_individual: bool,
}

/// A weighted edge between two clusters in a view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEdge {
    pub source: u32,
    pub target: u32,
    /// Soft-membership-weighted accumulated weight.
    pub weight: f32,
    /// Raw underlying edge count contributing to this weight.
    pub raw_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_buckets_to_nearest_tenth() {
        assert_eq!(bucket_weight(0.04), 0);
        assert_eq!(bucket_weight(0.06), 1);
        assert_eq!(bucket_weight(0.95), 10);
        assert_eq!(bucket_weight(1.5), 10);
        assert_eq!(bucket_weight(-1.0), 0);
    }
}
