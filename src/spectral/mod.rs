//! `SpectralEngine`: the normalized-Laplacian embedding, its Ward
//! dendrogram, and the community-aware adjacency variant.

pub mod config;
pub mod linkage;
pub mod snapshot;
pub mod solver;

pub use config::{CompletenessWeighting, Linkage as LinkageMethod, SpectralConfig};
pub use linkage::{ward_linkage, Linkage, LinkageRow};
pub use snapshot::{Manifest, Snapshot};
pub use solver::{blend_community_adjacency, build_weighted_adjacency, embed, EigenResult};

use std::path::Path;

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::concurrency::CancelGuard;
use crate::graph::GraphHandle;
use crate::types::{CoreError, GraphHash, MembershipMatrix};

/// Stateless entry point for `spectral.build` / `spectral.load`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpectralEngine;

impl SpectralEngine {
    /// `build(graph, config) -> Snapshot`.
    ///
    /// Runs the full pipeline: weighted adjacency, optional community
    /// blending, normalized Laplacian, eigendecomposition, row
    /// normalization, Ward linkage, and a stability re-run. Never panics
    /// on non-convergence; the manifest's `solver_converged` flag carries
    /// that condition forward instead.
    pub fn build(
        &self,
        graph: &GraphHandle,
        config: &SpectralConfig,
        propagation_membership: Option<&MembershipMatrix>,
        cancel: &CancelGuard,
    ) -> Result<Snapshot, CoreError> {
        if cancel.should_stop() {
            return Err(CoreError::cancelled());
        }

        let mut weighted = build_weighted_adjacency(graph, config);

        if config.community_alpha > 0.0 {
            if let Some(matrix) = propagation_membership {
                weighted = blend_with_community(&weighted, matrix, graph, config.community_alpha);
            }
        }

        if cancel.should_stop() {
            return Err(CoreError::cancelled());
        }

        let result = embed(&weighted, config);

        if !result.converged {
            tracing::warn!(
                n_dims = config.n_dims,
                num_nodes = graph.num_nodes(),
                "spectral solver did not converge to a finite decomposition"
            );
        }

        let linkage = ward_linkage(&result.embedding);

        let stability_ari = if cancel.should_stop() {
            0.0
        } else {
            stability_run(&weighted, config, &result.embedding)
        };

        let eigenvalue_gap = if result.eigenvalues.len() >= 2 {
            (result.eigenvalues[result.eigenvalues.len() - 1]
                - result.eigenvalues[result.eigenvalues.len() - 2])
                .abs()
        } else {
            0.0
        };

        let manifest = Manifest {
            generated_at: chrono::Utc::now().timestamp(),
            source_graph_hash: graph.hash(),
            solver_iterations: result.iterations,
            eigenvalue_gap,
            stability_ari,
            solver_converged: result.converged,
            community_alpha: config.community_alpha,
            completeness_weighting: config.completeness_weighting,
            linkage_method: config.linkage,
        };

        let num_nodes = graph.num_nodes() as usize;
        let n_dims = result.embedding.ncols();
        let node_ids: Vec<String> = (0..graph.num_nodes())
            .map(|i| graph.account_at(i).id.to_string())
            .collect();
        let mut embedding_flat = vec![0.0f32; num_nodes * n_dims];
        for row in 0..num_nodes {
            for col in 0..n_dims {
                embedding_flat[row * n_dims + col] = result.embedding[(row, col)];
            }
        }

        Ok(Snapshot::new(
            embedding_flat,
            num_nodes,
            n_dims,
            node_ids,
            result.eigenvalues,
            linkage,
            manifest,
        ))
    }

    /// `load(path) -> Snapshot`: atomic load and validation against
    /// the current graph hash.
    pub fn load(&self, path: &Path, current_graph_hash: GraphHash) -> Result<Snapshot, CoreError> {
        let snapshot = Snapshot::load(path)?;
        snapshot.validate_against(current_graph_hash)?;
        Ok(snapshot)
    }
}

/// Blend `W` with the community co-occurrence term `M * M^T` from the
/// latest propagation run. `propagation_membership`'s rows
/// are densified in graph node order; accounts absent from the membership
/// matrix contribute an all-zero row (no community pull).
fn blend_with_community(
    w: &crate::graph::Csr<f32>,
    membership: &MembershipMatrix,
    graph: &GraphHandle,
    alpha: f32,
) -> crate::graph::Csr<f32> {
    let n = graph.num_nodes() as usize;
    let k = membership.community_keys.len();
    let mut m = DMatrix::<f32>::zeros(n, k);
    for i in 0..n {
        let id = &graph.account_at(i as u32).id;
        if let Some(vector) = membership.get(id) {
            for (c, &weight) in vector.weights.iter().enumerate() {
                m[(i, c)] = weight;
            }
        }
    }

    let w_dense = {
        let mut dense = DMatrix::<f32>::zeros(n, n);
        for row in 0..n {
            for (col, val) in w.row(row as u32) {
                dense[(row, col as usize)] = val;
            }
        }
        dense
    };

    let blended = blend_community_adjacency(&w_dense, &m, alpha);

    let mut triples = Vec::with_capacity(n * n / 4);
    for row in 0..n {
        for col in 0..n {
            let v = blended[(row, col)];
            if v.abs() > 1e-9 {
                triples.push((row as u32, col as u32, v));
            }
        }
    }
    crate::graph::Csr::from_triples(n as u32, triples)
}

/// Re-run the embedding `stability_runs` times with small additive noise
/// and report the mean ARI between Ward cuts at a fixed cut size (50),
/// or `num_nodes` if smaller.
fn stability_run(weighted: &crate::graph::Csr<f32>, config: &SpectralConfig, base_embedding: &DMatrix<f32>) -> f32 {
    let n = base_embedding.nrows();
    if n < 3 || config.stability_runs == 0 {
        return 1.0;
    }
    let cut_size = 50usize.min(n);
    let base_linkage = ward_linkage(base_embedding);
    let base_labels = flat_cluster_labels(&base_linkage, cut_size);

    let aris: Vec<f32> = (0..config.stability_runs)
        .into_par_iter()
        .map(|run_idx| {
            let mut rng = rand::rngs::StdRng::seed_from_u64(config.seed.wrapping_add(run_idx as u64 + 1));
            let normal = Normal::new(0.0f32, 1e-3).unwrap();
            let mut perturbed = embed(weighted, config).embedding;
            for v in perturbed.iter_mut() {
                *v += normal.sample(&mut rng);
            }
            let linkage = ward_linkage(&perturbed);
            let labels = flat_cluster_labels(&linkage, cut_size);
            crate::graph::adjusted_rand_index(&base_labels, &labels)
        })
        .collect();

    aris.iter().sum::<f32>() / aris.len() as f32
}

/// Flatten a dendrogram into exactly `k` (or fewer, if the tree is
/// smaller) flat cluster labels by cutting the `k-1` highest merges.
fn flat_cluster_labels(linkage: &Linkage, k: usize) -> Vec<u32> {
    let n = linkage.num_leaves as usize;
    let mut parent: Vec<u32> = (0..(n + linkage.rows.len()) as u32).collect();

    fn find(parent: &mut [u32], x: u32) -> u32 {
        if parent[x as usize] != x {
            parent[x as usize] = find(parent, parent[x as usize]);
        }
        parent[x as usize]
    }

    let merges_to_apply = linkage.rows.len().saturating_sub(k.saturating_sub(1).min(linkage.rows.len()));
    for (i, row) in linkage.rows.iter().enumerate() {
        if i >= merges_to_apply {
            break;
        }
        let node_id = (n + i) as u32;
        let left_root = find(&mut parent, row.left);
        let right_root = find(&mut parent, row.right);
        parent[left_root as usize] = node_id;
        parent[right_root as usize] = node_id;
    }

    let mut label_of: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();
    (0..n as u32)
        .map(|leaf| {
            let root = find(&mut parent, leaf);
            let next = label_of.len() as u32;
            *label_of.entry(root).or_insert(next)
        })
        .collect()
}

/// Loads and validates on-disk snapshots (cross-cutting "SnapshotLoader").
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotLoader;

impl SnapshotLoader {
    pub fn load(&self, path: &Path, current_graph_hash: GraphHash) -> Result<Snapshot, CoreError> {
        SpectralEngine.load(path, current_graph_hash)
    }
}
