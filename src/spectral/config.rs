//! `SpectralEngine` configuration.

use serde::{Deserialize, Serialize};

/// Linkage method used to build the dendrogram. Ward is the only method
/// implemented; the field exists so a future linkage can be selected
/// without changing the `Snapshot` schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    Ward,
}

impl Default for Linkage {
    fn default() -> Self {
        Self::Ward
    }
}

/// How observation-probability weighting is applied to adjacency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletenessWeighting {
    Off,
    /// Inverse probability weighting.
    Ipw,
}

impl Default for CompletenessWeighting {
    fn default() -> Self {
        Self::Off
    }
}

/// Configuration for [`crate::spectral::SpectralEngine::build`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralConfig {
    /// Target embedding dimensionality.
    pub n_dims: usize,
    /// Convergence tolerance for the eigensolver.
    pub solver_tol: f64,
    /// Maximum solver iterations before declaring non-convergence.
    pub solver_max_iter: usize,
    /// Dendrogram linkage method.
    pub linkage: Linkage,
    /// Number of perturbed re-runs used to estimate stability.
    pub stability_runs: usize,
    /// Seed for the stability-run noise and any other randomized step.
    pub seed: u64,
    /// Blend weight for the community-aware adjacency variant, `0` disables it.
    pub community_alpha: f32,
    /// Observation-probability weighting mode.
    pub completeness_weighting: CompletenessWeighting,
    /// Minimum clipped observation probability when `completeness_weighting = ipw`.
    pub obs_p_min: f32,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            n_dims: 30,
            solver_tol: 1e-10,
            solver_max_iter: 5000,
            linkage: Linkage::default(),
            stability_runs: 3,
            seed: 0,
            community_alpha: 0.0,
            completeness_weighting: CompletenessWeighting::default(),
            obs_p_min: 0.05,
        }
    }
}
