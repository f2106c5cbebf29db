//! Normalized-Laplacian eigendecomposition.

use nalgebra::{DMatrix, SymmetricEigen};

use crate::graph::{Csr, GraphHandle};
use crate::types::AccountView;

use super::config::{CompletenessWeighting, SpectralConfig};

/// Result of an eigendecomposition pass, before linkage.
pub struct EigenResult {
    /// Row-normalized embedding, `N x n_dims`.
    pub embedding: DMatrix<f32>,
    /// Eigenvalues of the retained (non-trivial) eigenpairs, ascending.
    pub eigenvalues: Vec<f32>,
    /// `true` if the dense solver produced a finite decomposition.
    pub converged: bool,
    /// Always 1 for the dense solver (single direct pass).
    pub iterations: usize,
}

/// Observation probability of a node: the fraction of its declared
/// following that the loaded graph actually captured as out-edges,
/// clipped to `obs_p_min`.
fn observation_probability(account: &AccountView, out_degree: u32, obs_p_min: f32) -> f32 {
    let declared = account.following_count.max(1) as f32;
    (out_degree as f32 / declared).min(1.0).max(obs_p_min)
}

/// Build the symmetric adjacency, optionally IPW-weighted.
pub fn build_weighted_adjacency(graph: &GraphHandle, config: &SpectralConfig) -> Csr<f32> {
    let sym = graph.symmetric_adjacency(true);
    if config.completeness_weighting != CompletenessWeighting::Ipw {
        return sym;
    }

    let directed = graph.directed_adjacency();
    let out_degrees: Vec<u32> = (0..graph.num_nodes()).map(|i| directed.degree(i)).collect();
    let obs_p: Vec<f32> = (0..graph.num_nodes())
        .map(|i| observation_probability(graph.account_at(i), out_degrees[i as usize], config.obs_p_min))
        .collect();

    let mut triples = Vec::with_capacity(sym.nnz());
    for row in 0..sym.num_nodes {
        for (col, w) in sym.row(row) {
            let scale = 1.0 / obs_p[row as usize].min(obs_p[col as usize]);
            triples.push((row, col, w * scale));
        }
    }
    Csr::from_triples(sym.num_nodes, triples)
}

/// Blend `W` with a community-membership co-occurrence term:
/// `(1-alpha)*W + alpha*M*Mt`. This crate uses a dense direct eigensolver
/// rather than a matrix-free iterative one, so `M*Mt` is built directly
/// here instead of being applied lazily.
pub fn blend_community_adjacency(w: &DMatrix<f32>, m: &DMatrix<f32>, alpha: f32) -> DMatrix<f32> {
    let mmt = m * m.transpose();
    w * (1.0 - alpha) + mmt * alpha
}

fn csr_to_dense(csr: &Csr<f32>) -> DMatrix<f32> {
    let n = csr.num_nodes as usize;
    let mut dense = DMatrix::<f32>::zeros(n, n);
    for row in 0..csr.num_nodes {
        for (col, w) in csr.row(row) {
            dense[(row as usize, col as usize)] = w;
        }
    }
    dense
}

/// Compute the normalized Laplacian `L_sym = I - D^{-1/2} W D^{-1/2}` and
/// extract the `n_dims + 1` smallest eigenpairs, dropping the trivial
/// first pair.
pub fn embed(weighted_adjacency: &Csr<f32>, config: &SpectralConfig) -> EigenResult {
    let n = weighted_adjacency.num_nodes as usize;
    let w = csr_to_dense(weighted_adjacency);

    let degrees: Vec<f32> = (0..n)
        .map(|i| (0..n).map(|j| w[(i, j)]).sum::<f32>().max(1e-12))
        .collect();
    let d_inv_sqrt: Vec<f32> = degrees.iter().map(|d| d.sqrt().recip()).collect();

    let mut l_sym = DMatrix::<f32>::identity(n, n);
    for i in 0..n {
        for j in 0..n {
            l_sym[(i, j)] -= d_inv_sqrt[i] * w[(i, j)] * d_inv_sqrt[j];
        }
    }

    let eigen = SymmetricEigen::new(l_sym);
    let converged = eigen.eigenvalues.iter().all(|v| v.is_finite());

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[a]
            .partial_cmp(&eigen.eigenvalues[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let want = (config.n_dims + 1).min(n);
    let keep: Vec<usize> = order.into_iter().take(want).skip(1).collect();

    let mut embedding = DMatrix::<f32>::zeros(n, keep.len());
    let mut eigenvalues = Vec::with_capacity(keep.len());
    for (col, &idx) in keep.iter().enumerate() {
        eigenvalues.push(eigen.eigenvalues[idx]);
        for row in 0..n {
            embedding[(row, col)] = eigen.eigenvectors[(row, idx)];
        }
    }

    l2_normalize_rows(&mut embedding);

    EigenResult {
        embedding,
        eigenvalues,
        converged,
        iterations: 1,
    }
}

/// L2-normalize each row of `m` in place. Rows of all zeros
/// (possible for an isolated node's embedding) are left unchanged.
fn l2_normalize_rows(m: &mut DMatrix<f32>) {
    for row in 0..m.nrows() {
        let norm: f32 = (0..m.ncols()).map(|c| m[(row, c)].powi(2)).sum::<f32>().sqrt();
        if norm > 1e-12 {
            for c in 0..m.ncols() {
                m[(row, c)] /= norm;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_clique_embedding_separates_cliques() {
        // Two 5-cliques joined by a single bridge edge (0-5).
        let mut triples = Vec::new();
        for i in 0..5u32 {
            for j in 0..5u32 {
                if i != j {
                    triples.push((i, j, 1.0f32));
                }
            }
        }
        for i in 5..10u32 {
            for j in 5..10u32 {
                if i != j {
                    triples.push((i, j, 1.0f32));
                }
            }
        }
        triples.push((0, 5, 1.0));
        triples.push((5, 0, 1.0));
        let csr = Csr::from_triples(10, triples);

        let config = SpectralConfig {
            n_dims: 2,
            ..Default::default()
        };
        let result = embed(&csr, &config);
        assert!(result.converged);

        let clique_a_sign = result.embedding[(0, 0)].signum();
        let clique_b_sign = result.embedding[(9, 0)].signum();
        assert_ne!(clique_a_sign, clique_b_sign);
        for i in 0..5 {
            assert_eq!(result.embedding[(i, 0)].signum(), clique_a_sign);
        }
        for i in 5..10 {
            assert_eq!(result.embedding[(i, 0)].signum(), clique_b_sign);
        }
    }

    #[test]
    fn rows_are_unit_norm() {
        let csr = Csr::from_triples(4, vec![(0, 1, 1.0), (1, 0, 1.0), (2, 3, 1.0), (3, 2, 1.0)]);
        let config = SpectralConfig {
            n_dims: 2,
            ..Default::default()
        };
        let result = embed(&csr, &config);
        for row in 0..4 {
            let norm: f32 = (0..result.embedding.ncols())
                .map(|c| result.embedding[(row, c)].powi(2))
                .sum::<f32>()
                .sqrt();
            assert!(norm < 1e-6 || (norm - 1.0).abs() < 1e-4);
        }
    }
}
