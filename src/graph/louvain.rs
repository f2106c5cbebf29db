//! A single-level greedy-modularity community detection pass, used both
//! as the Louvain signal blended into cluster edges and for the
//! adjusted-Rand agreement diagnostic against propagation output.
//!
//! The full multi-level Louvain algorithm repeatedly coarsens the graph by
//! community and re-optimizes; this crate implements only the first level
//! (iterate local moves to convergence on the original node set, no
//! coarsening pass) since every consumer here only needs a community
//! *signal* to blend with the spectral clustering, not a publishable
//! community-detection result.

use super::csr::Csr;

/// Greedy modularity optimization: repeatedly move each node into the
/// neighboring community that most increases modularity, until no move
/// improves it or `max_passes` is reached. Returns one community id per
/// node (`0..num_communities`, not necessarily contiguous until
/// [`renumber`](Self::renumber) is applied internally).
pub fn louvain_communities(adjacency: &Csr<f32>, max_passes: usize) -> Vec<u32> {
    let n = adjacency.num_nodes as usize;
    if n == 0 {
        return Vec::new();
    }

    let degree: Vec<f32> = (0..n)
        .map(|i| adjacency.row(i as u32).map(|(_, w)| w).sum::<f32>())
        .collect();
    let total_weight: f32 = degree.iter().sum::<f32>() / 2.0;
    let mut community: Vec<u32> = (0..n as u32).collect();

    if total_weight <= 0.0 {
        return renumber(&community);
    }

    let mut community_total: Vec<f32> = degree.clone();

    for _ in 0..max_passes {
        let mut moved = false;
        for node in 0..n {
            let current = community[node];
            let node_degree = degree[node];

            let mut weight_to: std::collections::HashMap<u32, f32> = std::collections::HashMap::new();
            for (neighbor, w) in adjacency.row(node as u32) {
                if neighbor as usize == node {
                    continue;
                }
                *weight_to.entry(community[neighbor as usize]).or_insert(0.0) += w;
            }

            community_total[current as usize] -= node_degree;

            let mut best_community = current;
            let mut best_gain = weight_to.get(&current).copied().unwrap_or(0.0)
                - node_degree * community_total[current as usize] / (2.0 * total_weight);

            for (&candidate, &w_to) in &weight_to {
                if candidate == current {
                    continue;
                }
                let gain =
                    w_to - node_degree * community_total[candidate as usize] / (2.0 * total_weight);
                if gain > best_gain + 1e-9 {
                    best_gain = gain;
                    best_community = candidate;
                }
            }

            community_total[best_community as usize] += node_degree;
            if best_community != current {
                community[node] = best_community;
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }

    renumber(&community)
}

fn renumber(community: &[u32]) -> Vec<u32> {
    let mut seen = std::collections::HashMap::new();
    community
        .iter()
        .map(|&c| {
            let next_id = seen.len() as u32;
            *seen.entry(c).or_insert(next_id)
        })
        .collect()
}

/// Adjusted Rand Index between two equal-length label assignments,
/// used for the stability metric and the Louvain-agreement
/// diagnostic.
pub fn adjusted_rand_index(a: &[u32], b: &[u32]) -> f32 {
    use std::collections::HashMap;
    assert_eq!(a.len(), b.len());
    let n = a.len();
    if n < 2 {
        return 1.0;
    }

    let mut contingency: HashMap<(u32, u32), u64> = HashMap::new();
    let mut row_totals: HashMap<u32, u64> = HashMap::new();
    let mut col_totals: HashMap<u32, u64> = HashMap::new();
    for i in 0..n {
        *contingency.entry((a[i], b[i])).or_insert(0) += 1;
        *row_totals.entry(a[i]).or_insert(0) += 1;
        *col_totals.entry(b[i]).or_insert(0) += 1;
    }

    let comb2 = |x: u64| -> f64 { (x as f64) * ((x as f64) - 1.0) / 2.0 };

    let sum_comb_c: f64 = contingency.values().map(|&v| comb2(v)).sum();
    let sum_comb_rows: f64 = row_totals.values().map(|&v| comb2(v)).sum();
    let sum_comb_cols: f64 = col_totals.values().map(|&v| comb2(v)).sum();
    let total_comb = comb2(n as u64);

    let expected_index = sum_comb_rows * sum_comb_cols / total_comb;
    let max_index = 0.5 * (sum_comb_rows + sum_comb_cols);

    if (max_index - expected_index).abs() < 1e-12 {
        return 1.0;
    }
    ((sum_comb_c - expected_index) / (max_index - expected_index)) as f32
}
