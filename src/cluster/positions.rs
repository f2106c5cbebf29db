//! Cluster layout: PCA projection of centroids to 2D, with a short
//! repulsion pass to reduce overlap.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, SymmetricEigen};

const REPULSION_PASSES: usize = 20;
const REPULSION_MIN_DISTANCE: f32 = 0.08;
const REPULSION_STEP: f32 = 0.02;

/// Project `centroids` (cluster id -> embedding-space centroid) to 2D.
/// Falls back to the first two embedding dimensions when fewer than 3
/// clusters are present, since a 2-point (or fewer) PCA is degenerate.
pub fn project_positions(centroids: &BTreeMap<u32, Vec<f32>>) -> BTreeMap<u32, (f32, f32)> {
    if centroids.len() < 3 {
        return centroids
            .iter()
            .map(|(&id, c)| (id, (c.first().copied().unwrap_or(0.0), c.get(1).copied().unwrap_or(0.0))))
            .collect();
    }

    let ids: Vec<u32> = centroids.keys().copied().collect();
    let n_dims = centroids.values().next().map(|c| c.len()).unwrap_or(0);
    let n = ids.len();

    let mean: Vec<f32> = (0..n_dims)
        .map(|d| centroids.values().map(|c| c[d]).sum::<f32>() / n as f32)
        .collect();

    let centered: Vec<Vec<f32>> = ids
        .iter()
        .map(|id| {
            centroids[id]
                .iter()
                .zip(&mean)
                .map(|(v, m)| v - m)
                .collect::<Vec<f32>>()
        })
        .collect();

    let mut cov = DMatrix::<f32>::zeros(n_dims, n_dims);
    for row in &centered {
        for a in 0..n_dims {
            for b in 0..n_dims {
                cov[(a, b)] += row[a] * row[b];
            }
        }
    }
    cov /= n as f32;

    let eigen = SymmetricEigen::new(cov);
    let mut order: Vec<usize> = (0..n_dims).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].partial_cmp(&eigen.eigenvalues[a]).unwrap_or(std::cmp::Ordering::Equal));
    let top = order.into_iter().take(2).collect::<Vec<_>>();

    let mut positions: BTreeMap<u32, (f32, f32)> = BTreeMap::new();
    for (i, &id) in ids.iter().enumerate() {
        let x = (0..n_dims).map(|d| centered[i][d] * eigen.eigenvectors[(d, top[0])]).sum::<f32>();
        let y = if top.len() > 1 {
            (0..n_dims).map(|d| centered[i][d] * eigen.eigenvectors[(d, top[1])]).sum::<f32>()
        } else {
            0.0
        };
        positions.insert(id, (x, y));
    }

    repel(positions)
}

/// A short, geometry-preserving repulsion pass: nodes closer than
/// [`REPULSION_MIN_DISTANCE`] are nudged apart along their connecting
/// axis, proportionally, for a fixed number of passes (no convergence
/// loop; this is cosmetic de-overlap, not a force-directed layout).
fn repel(mut positions: BTreeMap<u32, (f32, f32)>) -> BTreeMap<u32, (f32, f32)> {
    let ids: Vec<u32> = positions.keys().copied().collect();
    for _ in 0..REPULSION_PASSES {
        let snapshot: Vec<(f32, f32)> = ids.iter().map(|id| positions[id]).collect();
        let mut deltas = vec![(0.0f32, 0.0f32); ids.len()];
        let mut any_overlap = false;
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (xi, yi) = snapshot[i];
                let (xj, yj) = snapshot[j];
                let dx = xi - xj;
                let dy = yi - yj;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist < REPULSION_MIN_DISTANCE {
                    any_overlap = true;
                    let (ux, uy) = if dist > 1e-6 {
                        (dx / dist, dy / dist)
                    } else {
                        (1.0, 0.0)
                    };
                    deltas[i].0 += ux * REPULSION_STEP;
                    deltas[i].1 += uy * REPULSION_STEP;
                    deltas[j].0 -= ux * REPULSION_STEP;
                    deltas[j].1 -= uy * REPULSION_STEP;
                }
            }
        }
        if !any_overlap {
            break;
        }
        for (id, delta) in ids.iter().zip(deltas) {
            let entry = positions.get_mut(id).unwrap();
            entry.0 += delta.0;
            entry.1 += delta.1;
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_clusters_fall_back_to_spectral_dims() {
        let mut centroids = BTreeMap::new();
        centroids.insert(0, vec![1.0, 2.0, 3.0]);
        centroids.insert(1, vec![4.0, 5.0, 6.0]);
        let positions = project_positions(&centroids);
        assert_eq!(positions[&0], (1.0, 2.0));
        assert_eq!(positions[&1], (4.0, 5.0));
    }

    #[test]
    fn three_or_more_clusters_use_pca() {
        let mut centroids = BTreeMap::new();
        centroids.insert(0, vec![0.0, 0.0]);
        centroids.insert(1, vec![1.0, 0.0]);
        centroids.insert(2, vec![0.0, 1.0]);
        let positions = project_positions(&centroids);
        assert_eq!(positions.len(), 3);
    }
}
