//! The four discovery signals, each reported as a raw/normalized pair so
//! a caller can reconstruct the composite score from the stored fields.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::dijkstra;
use petgraph::graphmap::UnGraphMap;

use crate::graph::GraphHandle;
use crate::types::MembershipMatrix;

use super::request::DEFAULT_MAX_DISTANCE;

/// One signal's raw and [0,1]-normalized value ("Explainability").
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalValue {
    pub raw: f32,
    pub normalized: f32,
}

/// Per-candidate signal bundle, before weighting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Signals {
    pub neighbor_overlap: SignalValue,
    pub community: SignalValue,
    pub path_distance: SignalValue,
    pub pagerank: SignalValue,
}

/// The set of accounts every seed follows (outbound neighbors), used as the
/// fixed left-hand side of the neighbor-overlap signal.
pub fn seeds_following(graph: &GraphHandle, seeds: &[u32]) -> BTreeSet<u32> {
    let directed = graph.directed_adjacency();
    seeds.iter().flat_map(|&s| directed.row(s).map(|(t, _)| t)).collect()
}

/// `followers(c)`: nodes with an outbound edge to `c`.
pub fn followers_index(graph: &GraphHandle) -> HashMap<u32, BTreeSet<u32>> {
    let mut rev: HashMap<u32, BTreeSet<u32>> = HashMap::new();
    for e in graph.edges() {
        let (Some(s), Some(t)) = (graph.node_index(&e.source), graph.node_index(&e.target)) else {
            continue;
        };
        rev.entry(t).or_default().insert(s);
    }
    rev
}

/// `|seeds_following ∩ followers(c)| / max(1, |seeds_following|)`, capped at 1.
pub fn neighbor_overlap(seeds_following: &BTreeSet<u32>, followers: &BTreeSet<u32>) -> SignalValue {
    let intersection = seeds_following.intersection(followers).count() as f32;
    let denom = seeds_following.len().max(1) as f32;
    SignalValue {
        raw: intersection,
        normalized: (intersection / denom).min(1.0),
    }
}

/// Hard community assignment (argmax, `None` if abstaining or unlisted) for
/// every candidate/seed used by the community-affinity signal.
fn hard_community(matrix: Option<&MembershipMatrix>, account: &crate::types::AccountId) -> Option<usize> {
    let row = matrix?.get(account)?;
    if row.abstain {
        return None;
    }
    row.argmax().map(|(idx, _)| idx)
}

/// `|seeds in same community as c| / |seeds|`.
pub fn community_affinity(
    matrix: Option<&MembershipMatrix>,
    seed_ids: &[crate::types::AccountId],
    candidate_id: &crate::types::AccountId,
) -> SignalValue {
    let Some(candidate_community) = hard_community(matrix, candidate_id) else {
        return SignalValue::default();
    };
    let matches = seed_ids
        .iter()
        .filter(|s| hard_community(matrix, s) == Some(candidate_community))
        .count() as f32;
    let denom = seed_ids.len().max(1) as f32;
    SignalValue {
        raw: matches,
        normalized: (matches / denom).min(1.0),
    }
}

/// Build an undirected unit-weight graph over `nodes`, restricted to mutual
/// edges, for shortest-path computation.
pub fn build_mutual_graph(graph: &GraphHandle, nodes: &BTreeSet<u32>) -> UnGraphMap<u32, u32> {
    let mutual = graph.mutual_subgraph();
    let mut g: UnGraphMap<u32, u32> = UnGraphMap::new();
    for &n in nodes {
        g.add_node(n);
    }
    for &n in nodes {
        for (c, _) in mutual.row(n) {
            if nodes.contains(&c) {
                g.add_edge(n, c, 1);
            }
        }
    }
    g
}

/// Single-source-shortest-path distance (unit weight) from every seed,
/// folded down to the minimum distance per reachable node.
pub fn seed_distances(g: &UnGraphMap<u32, u32>, seeds: &[u32]) -> HashMap<u32, u32> {
    let mut best: HashMap<u32, u32> = HashMap::new();
    for &s in seeds {
        if !g.contains_node(s) {
            continue;
        }
        for (node, d) in dijkstra(g, s, None, |_| 1u32) {
            best.entry(node).and_modify(|cur| *cur = (*cur).min(d)).or_insert(d);
        }
    }
    best
}

/// Linear decay from `1.0` at distance 1 to `0.1` at `max_distance`, `0`
/// beyond. `max_distance == 1` collapses to a step function.
pub fn path_distance_signal(distance: Option<u32>, max_distance: u32) -> SignalValue {
    let Some(d) = distance.filter(|&d| d >= 1) else {
        return SignalValue { raw: f32::INFINITY, normalized: 0.0 };
    };
    if d > max_distance {
        return SignalValue { raw: d as f32, normalized: 0.0 };
    }
    let normalized = if max_distance <= 1 {
        1.0
    } else {
        let span = (max_distance - 1) as f32;
        1.0 - ((d - 1) as f32 / span) * 0.9
    };
    SignalValue { raw: d as f32, normalized: normalized.max(0.1).min(1.0) }
}

pub fn default_max_distance() -> u32 {
    DEFAULT_MAX_DISTANCE
}

/// Personalized PageRank restricted to `nodes`, teleporting uniformly onto
/// `seeds`. Dangling mass (candidates with no in-set outbound edges) is
/// redistributed to the teleport vector each iteration so total mass is
/// conserved.
pub fn personalized_pagerank(
    graph: &GraphHandle,
    nodes: &[u32],
    seeds: &[u32],
    damping: f32,
    iterations: usize,
) -> BTreeMap<u32, f32> {
    let local_index: HashMap<u32, usize> = nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
    let n = nodes.len();
    if n == 0 {
        return BTreeMap::new();
    }
    let directed = graph.directed_adjacency();

    let adjacency: Vec<Vec<usize>> = nodes
        .iter()
        .map(|&node| directed.row(node).filter_map(|(c, _)| local_index.get(&c).copied()).collect())
        .collect();

    let seed_locals: Vec<usize> = seeds.iter().filter_map(|s| local_index.get(s).copied()).collect();
    let mut teleport = vec![0.0f32; n];
    if seed_locals.is_empty() {
        let uniform = 1.0 / n as f32;
        teleport.iter_mut().for_each(|t| *t = uniform);
    } else {
        let mass = 1.0 / seed_locals.len() as f32;
        for &i in &seed_locals {
            teleport[i] = mass;
        }
    }

    let mut pr = teleport.clone();
    for _ in 0..iterations {
        let mut next = vec![0.0f32; n];
        let mut dangling_mass = 0.0f32;
        for i in 0..n {
            if adjacency[i].is_empty() {
                dangling_mass += pr[i];
                continue;
            }
            let share = pr[i] / adjacency[i].len() as f32;
            for &j in &adjacency[i] {
                next[j] += share;
            }
        }
        for i in 0..n {
            next[i] = damping * (next[i] + dangling_mass * teleport[i]) + (1.0 - damping) * teleport[i];
        }
        pr = next;
    }

    nodes.iter().copied().zip(pr).collect()
}

/// Normalize raw pagerank mass by its 95th-percentile value among
/// candidates (seeds excluded), clipping at 1.0.
pub fn normalize_pagerank(raw: &BTreeMap<u32, f32>, candidates: &[u32]) -> HashMap<u32, SignalValue> {
    let mut values: Vec<f32> = candidates.iter().filter_map(|c| raw.get(c).copied()).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let p95 = if values.is_empty() {
        1.0
    } else {
        let idx = ((values.len() as f32 - 1.0) * 0.95).round() as usize;
        values[idx.min(values.len() - 1)].max(1e-9)
    };
    candidates
        .iter()
        .map(|&c| {
            let raw_value = raw.get(&c).copied().unwrap_or(0.0);
            let signal = SignalValue { raw: raw_value, normalized: (raw_value / p95).min(1.0) };
            (c, signal)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_overlap_caps_at_one() {
        let following: BTreeSet<u32> = [1, 2, 3].into_iter().collect();
        let followers: BTreeSet<u32> = [1, 2, 3, 4].into_iter().collect();
        let signal = neighbor_overlap(&following, &followers);
        assert_eq!(signal.normalized, 1.0);
    }

    #[test]
    fn path_distance_decays_linearly() {
        let at_one = path_distance_signal(Some(1), 3);
        assert!((at_one.normalized - 1.0).abs() < 1e-6);
        let at_three = path_distance_signal(Some(3), 3);
        assert!((at_three.normalized - 0.1).abs() < 1e-3);
        let beyond = path_distance_signal(Some(4), 3);
        assert_eq!(beyond.normalized, 0.0);
        let unreachable = path_distance_signal(None, 3);
        assert_eq!(unreachable.normalized, 0.0);
    }

    #[test]
    fn seed_distances_finds_shortest_hop() {
        let mut g: UnGraphMap<u32, u32> = UnGraphMap::new();
        g.add_edge(0, 1, 1);
        g.add_edge(1, 2, 1);
        let distances = seed_distances(&g, &[0]);
        assert_eq!(distances.get(&2), Some(&2));
    }

}
