//! Soft membership and cluster-edge construction.

use std::collections::BTreeMap;

use crate::graph::GraphHandle;
use crate::spectral::Snapshot;

use super::cut::Cut;

const EDGE_WEIGHT_EPSILON: f32 = 0.01;
const MEMBERSHIP_EPSILON: f32 = 1e-4;

/// Dense `num_nodes x num_clusters` soft membership, plus the cluster id
/// each column corresponds to (in column order).
pub struct SoftMembership {
    pub cluster_ids: Vec<u32>,
    /// `weights[node_idx][cluster_col]`.
    pub weights: Vec<Vec<f32>>,
}

impl SoftMembership {
    /// The column index (hard argmax) a node is most associated with.
    fn argmax_col(&self, node_idx: usize) -> usize {
        self.weights[node_idx]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// Softmax over negative Euclidean distance from each node's embedding
/// row to every cluster centroid, with `temperature` scaling. Rows sum
/// to 1.
pub fn soft_membership(snapshot: &Snapshot, cut: &Cut, temperature: f32) -> SoftMembership {
    let cluster_ids: Vec<u32> = cut.keys().copied().collect();
    let centroids: Vec<Vec<f32>> = cluster_ids
        .iter()
        .map(|id| centroid_of(snapshot, &cut[id]))
        .collect();

    let temperature = temperature.max(1e-6);
    let num_nodes = snapshot.num_nodes();
    let mut weights = Vec::with_capacity(num_nodes);

    for node in 0..num_nodes {
        let row = snapshot.embedding_row(node);
        let neg_dists: Vec<f32> = centroids
            .iter()
            .map(|c| -euclidean_distance(row, c) / temperature)
            .collect();
        weights.push(softmax(&neg_dists));
    }

    SoftMembership { cluster_ids, weights }
}

fn centroid_of(snapshot: &Snapshot, members: &[u32]) -> Vec<f32> {
    let n_dims = snapshot.n_dims();
    let mut sum = vec![0.0f32; n_dims];
    for &m in members {
        let row = snapshot.embedding_row(m as usize);
        for (d, v) in row.iter().enumerate() {
            sum[d] += v;
        }
    }
    let count = members.len().max(1) as f32;
    for v in &mut sum {
        *v /= count;
    }
    sum
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}

fn softmax(values: &[f32]) -> Vec<f32> {
    if values.is_empty() {
        return Vec::new();
    }
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum::<f32>().max(1e-12);
    exps.into_iter().map(|v| v / sum).collect()
}

/// Cluster-to-cluster edges, with optional Louvain-signal fusion.
pub fn cluster_edges(
    graph: &GraphHandle,
    membership: &SoftMembership,
    louvain_communities: Option<&[u32]>,
    signal_blend: f32,
) -> Vec<crate::types::ClusterEdge> {
    let k = membership.cluster_ids.len();
    let mut weight_matrix: BTreeMap<(usize, usize), f32> = BTreeMap::new();
    let mut raw_counts: BTreeMap<(usize, usize), u32> = BTreeMap::new();
    let w = signal_blend.clamp(0.0, 1.0);

    for edge in graph.edges() {
        let (Some(i), Some(j)) = (graph.node_index(&edge.source), graph.node_index(&edge.target)) else {
            continue;
        };
        let (i, j) = (i as usize, j as usize);

        let scale = match louvain_communities {
            Some(communities) if communities[i] == communities[j] => 1.0 + w,
            Some(_) => (1.0 - w).max(0.0),
            None => 1.0,
        };

        let a = membership.argmax_col(i);
        let b = membership.argmax_col(j);
        *raw_counts.entry((a, b)).or_insert(0) += 1;

        for ca in 0..k {
            let m_ica = membership.weights[i][ca];
            if m_ica < MEMBERSHIP_EPSILON {
                continue;
            }
            for cb in 0..k {
                let m_jcb = membership.weights[j][cb];
                if m_jcb < MEMBERSHIP_EPSILON {
                    continue;
                }
                *weight_matrix.entry((ca, cb)).or_insert(0.0) += m_ica * m_jcb * scale;
            }
        }
    }

    let mut edges = Vec::new();
    for ((ca, cb), weight) in weight_matrix {
        if ca == cb || weight < EDGE_WEIGHT_EPSILON {
            continue;
        }
        edges.push(crate::types::ClusterEdge {
            source: membership.cluster_ids[ca],
            target: membership.cluster_ids[cb],
            weight,
            raw_count: raw_counts.get(&(ca, cb)).copied().unwrap_or(0),
        });
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let out = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn softmax_favors_larger_value() {
        let out = softmax(&[-10.0, 0.0]);
        assert!(out[1] > out[0]);
    }
}
