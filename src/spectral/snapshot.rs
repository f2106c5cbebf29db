//! The `Snapshot` artifact: an immutable, atomically-swapped
//! spectral embedding plus dendrogram.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{CoreError, GraphHash};

use super::config::{CompletenessWeighting, Linkage as LinkageMethod};
use super::linkage::{Linkage, LinkageRow};

/// Diagnostic and provenance fields carried alongside a snapshot's arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Unix timestamp the snapshot was built.
    pub generated_at: i64,
    /// Hash of the graph this snapshot was built from.
    pub source_graph_hash: GraphHash,
    /// Iterations the eigensolver reported (always `1` for the dense
    /// direct solver used here).
    pub solver_iterations: usize,
    /// Gap between the last two retained eigenvalues.
    pub eigenvalue_gap: f32,
    /// Mean adjusted Rand index across `stability_runs` perturbed re-runs.
    pub stability_ari: f32,
    /// `false` if the solver produced a non-finite decomposition.
    pub solver_converged: bool,
    /// `community_alpha` used to build this snapshot.
    pub community_alpha: f32,
    /// `completeness_weighting` used to build this snapshot.
    pub completeness_weighting: CompletenessWeighting,
    /// Linkage method used.
    pub linkage_method: LinkageMethod,
}

/// A persisted spectral embedding and dendrogram, immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Row-major embedding, `num_nodes * n_dims` entries.
    embedding_flat: Vec<f32>,
    num_nodes: usize,
    n_dims: usize,
    /// Node ids in row order, matching `GraphHandle`'s dense index.
    pub node_ids: Vec<String>,
    pub eigenvalues: Vec<f32>,
    pub linkage_rows: Vec<LinkageRow>,
    pub manifest: Manifest,
}

impl Snapshot {
    pub fn new(
        embedding_flat: Vec<f32>,
        num_nodes: usize,
        n_dims: usize,
        node_ids: Vec<String>,
        eigenvalues: Vec<f32>,
        linkage: Linkage,
        manifest: Manifest,
    ) -> Self {
        Self {
            embedding_flat,
            num_nodes,
            n_dims,
            node_ids,
            eigenvalues,
            linkage_rows: linkage.rows,
            manifest,
        }
    }

    /// The embedding row for node index `i`.
    pub fn embedding_row(&self, i: usize) -> &[f32] {
        let start = i * self.n_dims;
        &self.embedding_flat[start..start + self.n_dims]
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn n_dims(&self) -> usize {
        self.n_dims
    }

    pub fn linkage(&self) -> Linkage {
        Linkage {
            rows: self.linkage_rows.clone(),
            num_leaves: self.num_nodes as u32,
        }
    }

    /// Validate this snapshot against the currently-loaded graph's hash
    /// (`load`: "atomic load and validation against the current
    /// graph hash").
    pub fn validate_against(&self, current: GraphHash) -> Result<(), CoreError> {
        if self.manifest.source_graph_hash != current {
            return Err(CoreError::stale(self.manifest.source_graph_hash, current));
        }
        Ok(())
    }

    /// Serialize to the canonical `snapshot.spectral` byte format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(|e| CoreError::integrity(format!("snapshot encode failed: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::integrity(format!("snapshot decode failed: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)
            .map_err(|e| CoreError::internal(format!("failed to write snapshot to {path:?}: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let bytes = std::fs::read(path)
            .map_err(|e| CoreError::not_found(format!("snapshot not found at {path:?}: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::linkage::LinkageRow;

    fn sample_snapshot() -> Snapshot {
        let manifest = Manifest {
            generated_at: 1,
            source_graph_hash: GraphHash::compute(&"g"),
            solver_iterations: 1,
            eigenvalue_gap: 0.1,
            stability_ari: 0.9,
            solver_converged: true,
            community_alpha: 0.0,
            completeness_weighting: CompletenessWeighting::Off,
            linkage_method: LinkageMethod::Ward,
        };
        Snapshot::new(
            vec![1.0, 0.0, 0.0, 1.0],
            2,
            2,
            vec!["a".into(), "b".into()],
            vec![0.1, 0.2],
            Linkage {
                rows: vec![LinkageRow {
                    left: 0,
                    right: 1,
                    distance: 1.0,
                    size: 2,
                }],
                num_leaves: 2,
            },
            manifest,
        )
    }

    #[test]
    fn save_load_round_trip_preserves_arrays() {
        let snap = sample_snapshot();
        let bytes = snap.to_bytes().unwrap();
        let loaded = Snapshot::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.eigenvalues, snap.eigenvalues);
        assert_eq!(loaded.embedding_row(0), snap.embedding_row(0));
        assert_eq!(loaded.linkage_rows.len(), snap.linkage_rows.len());
    }

    #[test]
    fn stale_hash_is_rejected() {
        let snap = sample_snapshot();
        let other = GraphHash::compute(&"different");
        assert!(snap.validate_against(other).is_err());
        assert!(snap.validate_against(snap.manifest.source_graph_hash).is_ok());
    }
}
