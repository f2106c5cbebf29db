//! `PropagationEngine`: multi-class Gaussian-random-field label
//! propagation with class balancing, temperature smoothing, and an
//! explicit "abstain" class.

pub mod anchors;
pub mod config;
mod solver;

pub use anchors::AnchorSet;
pub use config::{ClassBalance, ObservationWeighting, PropagationConfig, WalkKind};

use std::collections::BTreeMap;

use crate::graph::{adjusted_rand_index, louvain_communities, GraphHandle};
use crate::types::{AccountId, CoreError, MembershipMatrix, MembershipVector, Warning};

const LOUVAIN_MAX_PASSES: usize = 20;

/// Per-run propagation diagnostics, computed once per run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// Fraction of total mass sitting in the "none" column across all
    /// accounts. Expect 40-60% for sparse seeding on realistic graphs.
    pub none_class_fraction: f32,
    /// Per-community absorbed mass divided by that community's anchor
    /// count. Flagged in `warnings` when it exceeds 3x.
    pub absorption_ratio: BTreeMap<String, f32>,
    /// Mean combined uncertainty per community (by hard argmax).
    pub mean_uncertainty_per_community: BTreeMap<String, f32>,
    /// Adjusted Rand index between hard argmax community assignment and a
    /// single-level Louvain pass over the same graph.
    pub louvain_agreement_ari: f32,
}

/// The outcome of one `propagation.run` call.
pub struct PropagationResult {
    pub matrix: MembershipMatrix,
    pub diagnostics: Diagnostics,
    pub warnings: Vec<Warning>,
}

/// Stateless entry point for `propagation.run`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropagationEngine;

impl PropagationEngine {
    /// `propagate(graph, anchors, config) -> MembershipMatrix`.
    pub fn propagate(
        &self,
        graph: &GraphHandle,
        anchors: &AnchorSet,
        config: &PropagationConfig,
    ) -> Result<PropagationResult, CoreError> {
        let mut warnings = Vec::new();

        let dropped = anchors.communities_without_positive_anchors();
        let mut effective = anchors.clone();
        for community in &dropped {
            warnings.push(Warning::new(
                "community_dropped_no_positive_anchors",
                format!("community '{community}' has no positive anchors and was dropped"),
            ));
        }
        if !dropped.is_empty() {
            effective = drop_communities(anchors, &dropped);
        }

        let solved = solver::solve(graph, &effective, config);
        let communities = effective.communities().to_vec();
        let k = communities.len();

        let directed = graph.directed_adjacency();
        let mut rows = BTreeMap::new();
        let mut none_mass_total = 0.0f64;
        let mut community_mass: Vec<f64> = vec![0.0; k];
        let mut community_uncertainty_sum: Vec<f64> = vec![0.0; k];
        let mut community_uncertainty_count: Vec<u64> = vec![0; k];
        let mut hard_labels = Vec::with_capacity(graph.num_nodes() as usize);

        for node in 0..graph.num_nodes() {
            let account = graph.account_at(node);
            let solved_row = &solved.rows[node as usize];
            let weights: Vec<f32> = solved_row.weights[..k.min(solved_row.weights.len().saturating_sub(1))].to_vec();
            let none_weight = *solved_row.weights.last().unwrap_or(&1.0);

            let entropy = shannon_entropy(&solved_row.weights);
            let degree = directed.degree(node) as f32;
            let degree_uncertainty = 1.0 / (degree + 1.0).sqrt();
            let uncertainty = config.uncertainty_entropy_weight * entropy
                + config.uncertainty_degree_weight * degree_uncertainty;

            let (argmax_idx, argmax_weight) = argmax(&weights);
            let abstain = argmax_weight < config.abstain_confidence || uncertainty > config.abstain_uncertainty;

            none_mass_total += none_weight as f64;
            if let Some(idx) = argmax_idx {
                if !abstain {
                    community_mass[idx] += argmax_weight as f64;
                    community_uncertainty_sum[idx] += uncertainty as f64;
                    community_uncertainty_count[idx] += 1;
                }
            }
            hard_labels.push(if abstain { u32::MAX } else { argmax_idx.map(|i| i as u32).unwrap_or(u32::MAX) });

            rows.insert(
                account.id.clone(),
                MembershipVector {
                    account_id: account.id.clone(),
                    weights,
                    none_weight,
                    entropy,
                    degree_uncertainty,
                    uncertainty,
                    abstain,
                },
            );
        }

        let n = graph.num_nodes().max(1) as f64;
        let mut absorption_ratio = BTreeMap::new();
        let mut mean_uncertainty_per_community = BTreeMap::new();
        for (i, community) in communities.iter().enumerate() {
            let anchor_count = effective.positive_count(community).max(1) as f64;
            let ratio = community_mass[i] / anchor_count;
            absorption_ratio.insert(community.clone(), ratio as f32);
            if ratio > 3.0 {
                warnings.push(Warning::new(
                    "absorption_ratio_exceeded",
                    format!("community '{community}' absorbed {ratio:.2}x its anchor count"),
                ));
            }
            let mean_u = if community_uncertainty_count[i] > 0 {
                community_uncertainty_sum[i] / community_uncertainty_count[i] as f64
            } else {
                0.0
            };
            mean_uncertainty_per_community.insert(community.clone(), mean_u as f32);
        }

        let louvain_agreement_ari = if k > 0 {
            let louvain = louvain_communities(&graph.symmetric_adjacency(true), LOUVAIN_MAX_PASSES);
            let remapped_hard: Vec<u32> = hard_labels
                .iter()
                .map(|&l| if l == u32::MAX { k as u32 } else { l })
                .collect();
            adjusted_rand_index(&remapped_hard, &louvain)
        } else {
            0.0
        };

        let diagnostics = Diagnostics {
            none_class_fraction: (none_mass_total / n) as f32,
            absorption_ratio,
            mean_uncertainty_per_community,
            louvain_agreement_ari,
        };

        let version_key = format!(
            "{}/{}/{}",
            graph.hash(),
            effective.content_hash(),
            crate::types::GraphHash::compute(config)
        );

        Ok(PropagationResult {
            matrix: MembershipMatrix { community_keys: communities, rows, version_key },
            diagnostics,
            warnings,
        })
    }

    /// `propagation.get`: look up a previously computed membership row for
    /// one account from an already-built matrix. Kept as a thin
    /// accessor so the adapter layer does not need to know
    /// `MembershipMatrix`'s internal shape.
    pub fn get<'a>(&self, matrix: &'a MembershipMatrix, account: &AccountId) -> Option<&'a MembershipVector> {
        matrix.get(account)
    }
}

fn drop_communities(anchors: &AnchorSet, dropped: &[String]) -> AnchorSet {
    // Rebuild an anchor set excluding the dropped community keys by
    // replaying only the surviving tag assignments is unnecessary here:
    // `AnchorSet` has no public iterator over raw assignments, so instead
    // we reconstruct the community list directly. Since `mu`/`is_labeled`
    // already treat missing communities as absent, the simplest correct
    // fix is to filter `communities()` at the boundary-matrix call site.
    let mut filtered = anchors.clone();
    filtered.retain_communities(|c| !dropped.contains(&c.to_string()));
    filtered
}

fn shannon_entropy(weights: &[f32]) -> f32 {
    -weights
        .iter()
        .filter(|&&w| w > 1e-12)
        .map(|&w| w * w.ln())
        .sum::<f32>()
}

fn argmax(weights: &[f32]) -> (Option<usize>, f32) {
    weights
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, &w)| (Some(i), w))
        .unwrap_or((None, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphLoader, InMemoryGraphLoader};
    use crate::graph::store::GraphStore;
    use crate::types::{AccountId, AccountView, Direction, Polarity, Provenance, TagAssignment};

    fn account(id: &str) -> AccountView {
        AccountView {
            id: AccountId::resolved(id),
            username: id.to_string(),
            display_name: id.to_string(),
            follower_count: 0,
            following_count: 2,
            tweet_count: 0,
            like_count: 0,
            bio: None,
            provenance: Provenance::Archive,
            fetched_at: 0,
        }
    }

    fn edge(a: &str, b: &str) -> crate::types::Edge {
        crate::types::Edge {
            source: AccountId::resolved(a),
            target: AccountId::resolved(b),
            direction: Direction::Outbound,
            provenance: Provenance::Archive,
            weight: None,
            fetched_at: 0,
        }
    }

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

    async fn chain_graph() -> GraphHandle {
        // accounts 0..10, a chain plus two 2-node clusters around anchors.
        let accounts: Vec<_> = (0..10).map(|i| account(&i.to_string())).collect();
        let mut edges = vec![
            edge("0", "1"), edge("1", "0"),
            edge("5", "6"), edge("6", "5"),
        ];
        for i in 0..9 {
            edges.push(edge(&i.to_string(), &(i + 1).to_string()));
        }
        let loader = InMemoryGraphLoader::new(accounts, edges);
        GraphStore.load(&loader).await.unwrap()
    }

    #[tokio::test]
    async fn no_anchors_everyone_abstains_on_none() {
        let graph = chain_graph().await;
        let anchors = AnchorSet::default();
        let result = PropagationEngine.propagate(&graph, &anchors, &PropagationConfig::default()).unwrap();
        for row in result.matrix.rows.values() {
            assert!((row.none_weight - 1.0).abs() < 1e-6);
            assert!(row.abstain);
        }
    }

    #[tokio::test]
    async fn row_sums_are_stochastic() {
        let graph = chain_graph().await;
        let anchors = AnchorSet::from_tag_assignments(vec![
            tag("0", "a", Polarity::In, 1.0),
            tag("1", "a", Polarity::In, 1.0),
            tag("5", "b", Polarity::In, 1.0),
            tag("6", "b", Polarity::In, 1.0),
        ]);
        let result = PropagationEngine.propagate(&graph, &anchors, &PropagationConfig::default()).unwrap();
        for row in result.matrix.rows.values() {
            assert!((row.row_sum() - 1.0).abs() < 1e-4, "row_sum={}", row.row_sum());
        }
    }

    #[tokio::test]
    async fn anchors_strongly_favor_their_own_community() {
        let graph = chain_graph().await;
        let anchors = AnchorSet::from_tag_assignments(vec![
            tag("0", "a", Polarity::In, 1.0),
            tag("1", "a", Polarity::In, 1.0),
            tag("5", "b", Polarity::In, 1.0),
            tag("6", "b", Polarity::In, 1.0),
        ]);
        let result = PropagationEngine.propagate(&graph, &anchors, &PropagationConfig::default()).unwrap();
        let a_idx = result.matrix.community_index("a").unwrap();
        let b_idx = result.matrix.community_index("b").unwrap();
        let row0 = result.matrix.get(&AccountId::resolved("0")).unwrap();
        assert!(row0.weights[a_idx] >= 0.9);
        let row5 = result.matrix.get(&AccountId::resolved("5")).unwrap();
        assert!(row5.weights[b_idx] >= 0.9);
    }
}
