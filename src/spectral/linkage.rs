//! Ward linkage. No crate in the corpus provides agglomerative
//! clustering directly, so this is a from-scratch implementation over the
//! embedding produced by [`super::solver::embed`].

use nalgebra::DMatrix;

/// One row of a linkage matrix: two merged cluster ids, the merge
/// distance, and the resulting cluster size. Cluster ids `0..n` are the
/// original points; ids `>= n` are internal nodes created by merges, in
/// creation order, matching the SciPy linkage-matrix convention the spec
/// borrows (`(N-1, 4)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkageRow {
    pub left: u32,
    pub right: u32,
    pub distance: f32,
    pub size: u32,
}

/// A full Ward dendrogram: `N - 1` merge rows over `N` leaves.
#[derive(Debug, Clone)]
pub struct Linkage {
    pub rows: Vec<LinkageRow>,
    pub num_leaves: u32,
}

impl Linkage {
    /// Shape check used by tests and the snapshot validator.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), 4)
    }

    /// The immediate children of an internal node id (leaves have none).
    pub fn children(&self, node_id: u32) -> Option<(u32, u32)> {
        if node_id < self.num_leaves {
            return None;
        }
        let row = &self.rows[(node_id - self.num_leaves) as usize];
        Some((row.left, row.right))
    }
}

/// Ward's minimum-variance linkage criterion, computed with the
/// Lance-Williams update formula so merge distances never need to be
/// recomputed from scratch.
pub fn ward_linkage(points: &DMatrix<f32>) -> Linkage {
    let n = points.nrows();
    if n == 0 {
        return Linkage {
            rows: Vec::new(),
            num_leaves: 0,
        };
    }

    // active[i] = Some(centroid, size) for a still-live cluster id i.
    let mut centroids: Vec<Vec<f32>> = (0..n).map(|i| points.row(i).iter().copied().collect()).collect();
    let mut sizes: Vec<u32> = vec![1; n];
    let mut alive: Vec<bool> = vec![true; n];

    // distances[i][j] for i < j among currently-alive ids (dense; N is
    // small enough at this core's intended scale that O(N^2) memory and
    // an O(N^3) total merge loop are acceptable).
    let mut dist = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = squared_euclidean(&centroids[i], &centroids[j]);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    let mut rows = Vec::with_capacity(n.saturating_sub(1));
    let mut next_id = n as u32;
    let mut id_of: Vec<u32> = (0..n as u32).collect();

    for _ in 0..n.saturating_sub(1) {
        let mut best = (usize::MAX, usize::MAX, f32::INFINITY);
        for i in 0..n {
            if !alive[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !alive[j] {
                    continue;
                }
                if dist[i][j] < best.2 {
                    best = (i, j, dist[i][j]);
                }
            }
        }
        let (i, j, d) = best;

        let size_i = sizes[i] as f32;
        let size_j = sizes[j] as f32;
        let merged_size = size_i + size_j;
        let merged_centroid: Vec<f32> = centroids[i]
            .iter()
            .zip(&centroids[j])
            .map(|(a, b)| (a * size_i + b * size_j) / merged_size)
            .collect();

        rows.push(LinkageRow {
            left: id_of[i],
            right: id_of[j],
            distance: d.max(0.0).sqrt(),
            size: merged_size as u32,
        });

        // Lance-Williams update for every other alive cluster k.
        for k in 0..n {
            if !alive[k] || k == i || k == j {
                continue;
            }
            let size_k = sizes[k] as f32;
            let total = size_i + size_j + size_k;
            let new_d = ((size_i + size_k) * dist[i][k] + (size_j + size_k) * dist[j][k]
                - size_k * d)
                / total;
            dist[i][k] = new_d;
            dist[k][i] = new_d;
        }

        centroids[i] = merged_centroid;
        sizes[i] = merged_size as u32;
        alive[j] = false;
        id_of[i] = next_id;
        next_id += 1;
    }

    Linkage {
        rows,
        num_leaves: n as u32,
    }
}

fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
