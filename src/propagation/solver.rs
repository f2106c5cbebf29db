//! The regularized harmonic solve.

use nalgebra::DMatrix;

use crate::graph::GraphHandle;
use crate::spectral::{build_weighted_adjacency, CompletenessWeighting, SpectralConfig};

use super::anchors::AnchorSet;
use super::config::{ObservationWeighting, PropagationConfig, WalkKind};

const RESIDUAL_WARN_THRESHOLD: f64 = 1e-8;

/// One node's solved distribution over `K+1` classes, before abstain
/// classification. `fixed` is `true` for labeled (anchor-clamped) rows.
pub struct SolvedRow {
    pub weights: Vec<f32>,
    pub fixed: bool,
}

/// Output of [`solve`]: one row per graph node, in graph node-index order.
pub struct SolveResult {
    pub rows: Vec<SolvedRow>,
    /// `true` if `L_UU + reg*I` was singular for at least one connected
    /// unlabeled component.
    pub had_singular_component: bool,
}

/// Build the propagation Laplacian for the configured `walk_kind`.
fn build_laplacian(graph: &GraphHandle, config: &PropagationConfig) -> DMatrix<f32> {
    let n = graph.num_nodes() as usize;

    match config.walk_kind {
        WalkKind::Symmetric => {
            let adapter = SpectralConfig {
                completeness_weighting: match config.weighting {
                    ObservationWeighting::Off => CompletenessWeighting::Off,
                    ObservationWeighting::Ipw => CompletenessWeighting::Ipw,
                },
                obs_p_min: config.obs_p_min,
                ..SpectralConfig::default()
            };
            let w = build_weighted_adjacency(graph, &adapter);
            let mut dense = DMatrix::<f32>::zeros(n, n);
            for row in 0..n as u32 {
                for (col, val) in w.row(row) {
                    dense[(row as usize, col as usize)] = val;
                }
            }
            let degrees: Vec<f32> = (0..n).map(|i| (0..n).map(|j| dense[(i, j)]).sum::<f32>().max(1e-12)).collect();
            let d_inv_sqrt: Vec<f32> = degrees.iter().map(|d| d.sqrt().recip()).collect();

            let mut l = DMatrix::<f32>::identity(n, n);
            for i in 0..n {
                for j in 0..n {
                    l[(i, j)] -= d_inv_sqrt[i] * dense[(i, j)] * d_inv_sqrt[j];
                }
            }
            l
        }
        WalkKind::DirectedRandomWalk => {
            let directed = graph.directed_adjacency();
            let mut dense = DMatrix::<f32>::zeros(n, n);
            for row in 0..n as u32 {
                for (col, _) in directed.row(row) {
                    dense[(row as usize, col as usize)] = 1.0;
                }
            }
            let out_degree: Vec<f32> = (0..n).map(|i| (0..n).map(|j| dense[(i, j)]).sum::<f32>()).collect();
            let mut l = DMatrix::<f32>::identity(n, n);
            for i in 0..n {
                let d = out_degree[i];
                if d <= 0.0 {
                    continue;
                }
                for j in 0..n {
                    l[(i, j)] -= dense[(i, j)] / d;
                }
            }
            l
        }
    }
}

/// Build `F_L` with class balancing and row renormalization.
/// Returns `(labeled_node_indices, F_L)` where `F_L` is `|L| x (K+1)`.
fn boundary_matrix(
    graph: &GraphHandle,
    anchors: &AnchorSet,
    communities: &[String],
) -> (Vec<u32>, DMatrix<f32>) {
    let k = communities.len();
    let labeled: Vec<u32> = (0..graph.num_nodes())
        .filter(|&i| anchors.is_labeled(&graph.account_at(i).id))
        .collect();

    let mut f_l = DMatrix::<f32>::zeros(labeled.len(), k + 1);
    for (row, &node) in labeled.iter().enumerate() {
        let id = &graph.account_at(node).id;
        let mut sum = 0.0f32;
        for (c, community) in communities.iter().enumerate() {
            let mu = anchors.mu(id, community);
            f_l[(row, c)] = mu;
            sum += mu;
        }
        f_l[(row, k)] = (1.0 - sum).max(0.0);
    }

    // Class balancing: scale column c by 1/sqrt(|Cc|), then renormalize
    // rows so the boundary condition stays row-stochastic.
    for (c, community) in communities.iter().enumerate() {
        let count = anchors.positive_count(community).max(1) as f32;
        let scale = 1.0 / count.sqrt();
        for row in 0..labeled.len() {
            f_l[(row, c)] *= scale;
        }
    }
    for row in 0..labeled.len() {
        let sum: f32 = (0..=k).map(|c| f_l[(row, c)]).sum::<f32>().max(1e-12);
        for c in 0..=k {
            f_l[(row, c)] /= sum;
        }
    }

    (labeled, f_l)
}

/// Partition node indices into labeled/unlabeled, solve the regularized
/// harmonic system, and apply row-wise softmax with `temperature` to the
/// solved (unlabeled) rows only. Labeled rows are clamped boundary
/// conditions per the Gaussian-random-field formulation and are returned
/// exactly as built in [`boundary_matrix`], not re-smoothed by the softmax.
pub fn solve(graph: &GraphHandle, anchors: &AnchorSet, config: &PropagationConfig) -> SolveResult {
    let n = graph.num_nodes() as usize;
    let communities = anchors.communities();
    let k = communities.len();

    if k == 0 {
        // With no anchors at all, every row is the abstain column.
        let rows = (0..n)
            .map(|_| SolvedRow { weights: vec![1.0], fixed: true })
            .collect();
        return SolveResult { rows, had_singular_component: false };
    }

    let (labeled, f_l) = boundary_matrix(graph, anchors, communities);
    let labeled_set: std::collections::HashSet<u32> = labeled.iter().copied().collect();
    let unlabeled: Vec<u32> = (0..n as u32).filter(|i| !labeled_set.contains(i)).collect();

    if unlabeled.is_empty() {
        let mut rows: Vec<Option<SolvedRow>> = vec![None; n];
        for (row, &node) in labeled.iter().enumerate() {
            let weights = (0..=k).map(|c| f_l[(row, c)]).collect();
            rows[node as usize] = Some(SolvedRow { weights, fixed: true });
        }
        return SolveResult {
            rows: rows.into_iter().map(|r| r.unwrap()).collect(),
            had_singular_component: false,
        };
    }

    let l = build_laplacian(graph, config);

    let l_uu = DMatrix::from_fn(unlabeled.len(), unlabeled.len(), |r, c| {
        l[(unlabeled[r] as usize, unlabeled[c] as usize)]
    });
    let l_ul = DMatrix::from_fn(unlabeled.len(), labeled.len(), |r, c| {
        l[(unlabeled[r] as usize, labeled[c] as usize)]
    });

    let mut system = l_uu.clone();
    for i in 0..system.nrows() {
        system[(i, i)] += config.regularization;
    }
    let rhs = -(&l_ul * &f_l);

    let solved = system.clone().lu().solve(&rhs);

    let mut rows: Vec<Option<SolvedRow>> = vec![None; n];
    for (row, &node) in labeled.iter().enumerate() {
        let weights = (0..=k).map(|c| f_l[(row, c)]).collect();
        rows[node as usize] = Some(SolvedRow { weights, fixed: true });
    }

    let had_singular_component = match solved {
        Some(x) => {
            let residual = (&system * &x - &rhs).norm() as f64;
            if residual > RESIDUAL_WARN_THRESHOLD {
                tracing::warn!(residual, "propagation harmonic solve residual above threshold");
            }
            for (row, &node) in unlabeled.iter().enumerate() {
                let raw: Vec<f32> = (0..=k).map(|c| x[(row, c)]).collect();
                let weights = softmax(&raw, config.temperature);
                rows[node as usize] = Some(SolvedRow { weights, fixed: false });
            }
            false
        }
        None => {
            tracing::warn!(
                num_unlabeled = unlabeled.len(),
                "propagation L_UU singular; affected nodes abstain with uniform distribution"
            );
            let uniform = vec![1.0 / (k as f32 + 1.0); k + 1];
            for &node in &unlabeled {
                rows[node as usize] = Some(SolvedRow { weights: uniform.clone(), fixed: false });
            }
            true
        }
    };

    SolveResult {
        rows: rows.into_iter().map(|r| r.unwrap()).collect(),
        had_singular_component,
    }
}

fn softmax(values: &[f32], temperature: f32) -> Vec<f32> {
    let t = temperature.max(1e-6);
    let scaled: Vec<f32> = values.iter().map(|v| v / t).collect();
    let max = scaled.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scaled.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum::<f32>().max(1e-12);
    exps.into_iter().map(|v| v / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphLoader, InMemoryGraphLoader};
    use crate::graph::store::GraphStore;
    use crate::types::{AccountId, AccountView, Direction, Polarity, Provenance};

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

    #[tokio::test]
    async fn no_communities_yields_full_abstain() {
        let loader = InMemoryGraphLoader::new(vec![account("a"), account("b")], vec![edge("a", "b")]);
        let handle = GraphStore.load(&loader).await.unwrap();
        let anchors = AnchorSet::default();
        let result = solve(&handle, &anchors, &PropagationConfig::default());
        for row in &result.rows {
            assert_eq!(row.weights, vec![1.0]);
        }
    }

    #[tokio::test]
    async fn single_positive_anchor_is_clamped_to_full_weight() {
        let loader = InMemoryGraphLoader::new(
            vec![account("a"), account("b"), account("c")],
            vec![edge("a", "b"), edge("b", "a"), edge("b", "c"), edge("c", "b")],
        );
        let handle = GraphStore.load(&loader).await.unwrap();
        let assignment = crate::types::TagAssignment::new(
            "ws",
            AccountId::resolved("ego"),
            AccountId::resolved("a"),
            "community_x",
            Polarity::In,
            1.0,
            "tester",
            0,
        );
        let anchors = AnchorSet::from_tag_assignments(vec![assignment]);
        let result = solve(&handle, &anchors, &PropagationConfig::default());
        let a_idx = handle.node_index(&AccountId::resolved("a")).unwrap();
        assert!((result.rows[a_idx as usize].weights[0] - 1.0).abs() < 1e-6);
        assert!(result.rows[a_idx as usize].fixed);
    }
}
