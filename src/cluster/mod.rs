//! `ClusterService`: interactive, budget-constrained hierarchical
//! cluster views over a [`Snapshot`](crate::spectral::Snapshot).

mod cut;
mod labels;
mod membership;
mod positions;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheConfig, MetricsCache};
use crate::graph::{louvain_communities, GraphHandle};
use crate::spectral::Snapshot;
use crate::store::Store;
use crate::types::{
    bucket_weight, AccountId, AccountView, ClusterEdge, ClusterKey, ClusterNode, CoreError, LabelSource, Warning,
};

use cut::Cut;

const MIN_CLUSTER_SIZE: usize = 4;
const MIN_GRANULARITY: u32 = 5;
const MAX_GRANULARITY: u32 = 500;
const DEFAULT_TEMPERATURE: f32 = 1.0;
const CACHE_MAX_ENTRIES: usize = 20;
const CACHE_TTL: Duration = Duration::from_secs(600);

/// `view(query)` input.
#[derive(Debug, Clone)]
pub struct ClusterQuery {
    pub granularity: u32,
    pub ego: Option<AccountId>,
    pub focus_leaf: Option<u32>,
    /// Dendrogram ids to expand, in expansion order (last = most recent,
    /// used for LIFO budget collapse).
    pub expanded_set: Vec<u32>,
    pub collapsed_set: Vec<u32>,
    pub budget: u32,
    /// Spectral (0.0) vs. Louvain (1.0) signal blend for cluster edges.
    pub signal_blend: f32,
    /// Weight used to bucket the per-cluster label/cache key, independent
    /// of `signal_blend`. Rounded to the nearest 0.1 by `bucket_weight`.
    pub weight_bucket: f32,
    /// Expand highest-variance clusters breadth-first to fill unused budget.
    pub autofill: bool,
}

impl Default for ClusterQuery {
    fn default() -> Self {
        Self {
            granularity: 20,
            ego: None,
            focus_leaf: None,
            expanded_set: Vec::new(),
            collapsed_set: Vec::new(),
            budget: 50,
            signal_blend: 0.0,
            weight_bucket: 0.0,
            autofill: false,
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ClusterViewMeta {
    pub budget: u32,
    pub budget_remaining: u32,
    pub approximate_mode: bool,
}

#[derive(Debug, Clone)]
pub struct ClusterView {
    pub clusters: Vec<ClusterNode>,
    pub edges: Vec<ClusterEdge>,
    pub positions: BTreeMap<u32, (f32, f32)>,
    pub meta: ClusterViewMeta,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone)]
pub struct ExpandPreview {
    pub can_expand: bool,
    pub predicted_children: Vec<u32>,
    pub budget_impact: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CollapsePreview {
    pub can_collapse: bool,
    pub parent_id: Option<u32>,
    pub sibling_ids: Vec<u32>,
    pub nodes_freed: usize,
}

#[derive(Debug, Clone)]
pub struct PreviewResult {
    pub expand: ExpandPreview,
    pub collapse: CollapsePreview,
}

#[derive(Debug, Clone)]
pub struct MembersPage {
    pub members: Vec<AccountView>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// Serves interactive cluster views backed by one [`Snapshot`] and one
/// workspace's [`Store`] label overrides.
pub struct ClusterService<S: Store> {
    store: Arc<S>,
    workspace_id: String,
    cache: MetricsCache<String, CachedView>,
}

#[derive(Clone)]
struct CachedView {
    clusters: Vec<ClusterNode>,
    edges: Vec<ClusterEdge>,
    positions: BTreeMap<u32, (f32, f32)>,
    meta: ClusterViewMeta,
}

impl<S: Store> ClusterService<S> {
    pub fn new(store: Arc<S>, workspace_id: impl Into<String>) -> Self {
        Self {
            store,
            workspace_id: workspace_id.into(),
            cache: MetricsCache::new(CacheConfig::new(CACHE_MAX_ENTRIES, CACHE_TTL)),
        }
    }

    /// `view(query) -> ClusterView`.
    pub async fn view(&self, graph: &GraphHandle, snapshot: &Snapshot, query: &ClusterQuery) -> Result<ClusterView, CoreError> {
        snapshot.validate_against(graph.hash())?;

        let mut warnings = Vec::new();
        let granularity = clamp_granularity(query.granularity, &mut warnings);

        let cache_key = cache_key(snapshot, granularity, query);
        let cached = self.cache.get(&cache_key);

        if let Some(cached) = cached {
            return Ok(ClusterView {
                clusters: cached.clusters,
                edges: cached.edges,
                positions: cached.positions,
                meta: cached.meta,
                warnings,
            });
        }

        let linkage = snapshot.linkage();
        let expanded_order = &query.expanded_set;
        let expanded_all: BTreeSet<u32> = expanded_order.iter().copied().collect();
        let collapsed: BTreeSet<u32> = query.collapsed_set.iter().copied().collect();

        let base = cut::initial_cut(&linkage, granularity as usize);
        let mut cut = cut::apply_expand_collapse(&base, &linkage, &expanded_all, &collapsed);
        let (demoted_cut, _demoted) = cut::demote_small_clusters(cut, MIN_CLUSTER_SIZE);
        cut = demoted_cut;

        // Budget enforcement: LIFO-collapse the most-recently-expanded
        // nodes first when over budget.
        let mut effective_expanded: Vec<u32> = expanded_order.clone();
        while cut.len() as u32 > query.budget && !effective_expanded.is_empty() {
            effective_expanded.pop();
            let set: BTreeSet<u32> = effective_expanded.iter().copied().collect();
            let (demoted, _) = cut::demote_small_clusters(
                cut::apply_expand_collapse(&base, &linkage, &set, &collapsed),
                MIN_CLUSTER_SIZE,
            );
            cut = demoted;
        }

        let mut autofilled = false;
        if query.autofill && (cut.len() as u32) < query.budget {
            autofill(&mut cut, &linkage, snapshot, query.budget);
            autofilled = true;
        }
        let _ = autofilled;

        let budget_remaining = query.budget.saturating_sub(cut.len() as u32);
        let meta = ClusterViewMeta {
            budget: query.budget,
            budget_remaining,
            approximate_mode: !snapshot.manifest.solver_converged,
        };

        let soft = membership::soft_membership(snapshot, &cut, DEFAULT_TEMPERATURE);
        let louvain = louvain_communities(&graph.symmetric_adjacency(true), 20);
        let edges = membership::cluster_edges(graph, &soft, Some(&louvain), query.signal_blend);

        let centroids: BTreeMap<u32, Vec<f32>> = cut
            .iter()
            .map(|(&id, members)| (id, centroid(snapshot, members)))
            .collect();
        let positions = positions::project_positions(&centroids);

        let ego_node = query.ego.as_ref().and_then(|id| graph.node_index(id));

        let mut clusters = Vec::with_capacity(cut.len());
        for (&id, members) in &cut {
            let account_ids: Vec<AccountId> = members.iter().map(|&idx| graph.account_at(idx).id.clone()).collect();
            let views: Vec<&AccountView> = members.iter().map(|&idx| graph.account_at(idx)).collect();
            let key = ClusterKey::new(snapshot.manifest.source_graph_hash, granularity, query.weight_bucket, id);
            let override_label = self
                .store
                .get_cluster_label(&key)
                .await
                .map_err(|e| CoreError::internal(format!("failed to load cluster label: {e}")))?;
            let (label, label_source) = labels::resolve_label(override_label, id, &views);
            let contains_ego = ego_node.map(|n| members.contains(&n)).unwrap_or(false);

            clusters.push(ClusterNode {
                id,
                members: account_ids,
                size: members.len(),
                centroid: centroids.get(&id).cloned().unwrap_or_default(),
                label,
                label_source,
                contains_ego,
                is_individual: members.len() < MIN_CLUSTER_SIZE,
            });
        }

        self.cache.put(
            cache_key,
            CachedView {
                clusters: clusters.clone(),
                edges: edges.clone(),
                positions: positions.clone(),
                meta,
            },
        );

        Ok(ClusterView {
            clusters,
            edges,
            positions,
            meta,
            warnings,
        })
    }

    /// `preview(cluster_id, query)`.
    pub fn preview(&self, snapshot: &Snapshot, cluster_id: u32, query: &ClusterQuery) -> PreviewResult {
        let linkage = snapshot.linkage();

        let expand = match linkage.children(cluster_id) {
            Some((left, right)) => ExpandPreview {
                can_expand: true,
                predicted_children: vec![left, right],
                budget_impact: 1,
                reason: None,
            },
            None => ExpandPreview {
                can_expand: false,
                predicted_children: Vec::new(),
                budget_impact: 0,
                reason: Some("cluster is already a leaf".to_string()),
            },
        };

        let granularity = clamp_granularity(query.granularity, &mut Vec::new());
        let base = cut::initial_cut(&linkage, granularity as usize);
        let parent_id = find_parent(&linkage, &base, cluster_id);
        let collapse = match parent_id {
            Some(parent) => {
                let siblings: Vec<u32> = linkage
                    .children(parent)
                    .map(|(l, r)| if l == cluster_id { vec![r] } else { vec![l] })
                    .unwrap_or_default();
                CollapsePreview {
                    can_collapse: true,
                    parent_id: Some(parent),
                    sibling_ids: siblings,
                    nodes_freed: 1,
                }
            }
            None => CollapsePreview {
                can_collapse: false,
                parent_id: None,
                sibling_ids: Vec::new(),
                nodes_freed: 0,
            },
        };

        PreviewResult { expand, collapse }
    }

    /// `members(cluster_id, limit, offset)`: sorted
    /// by follower count descending, ties broken by username ascending.
    /// Operates over a previously computed [`ClusterView`] (the source of
    /// truth for cluster membership at this granularity/budget).
    pub fn members(&self, graph: &GraphHandle, view: &ClusterView, cluster_id: u32, limit: usize, offset: usize) -> MembersPage {
        let mut members: Vec<AccountView> = view
            .clusters
            .iter()
            .find(|c| c.id == cluster_id)
            .map(|c| {
                c.members
                    .iter()
                    .filter_map(|id| graph.node_metadata(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        members.sort_by(|a, b| {
            b.follower_count
                .cmp(&a.follower_count)
                .then_with(|| a.username.cmp(&b.username))
        });
        let total = members.len();
        let page: Vec<AccountView> = members.into_iter().skip(offset).take(limit).collect();
        MembersPage {
            members: page,
            total,
            offset,
            limit,
        }
    }

    /// `set_label(cluster_key, label)`.
    pub async fn set_label(&self, key: &ClusterKey, label: String) -> Result<(), CoreError> {
        self.store
            .set_cluster_label(key, label)
            .await
            .map_err(|e| CoreError::internal(format!("failed to set cluster label: {e}")))?;
        self.cache.invalidate_matching(|cache_key: &String| cache_key.contains(&key.snapshot_hash.to_string()));
        Ok(())
    }

    /// `delete_label(cluster_key)`.
    pub async fn delete_label(&self, key: &ClusterKey) -> Result<(), CoreError> {
        self.store
            .delete_cluster_label(key)
            .await
            .map_err(|e| CoreError::internal(format!("failed to delete cluster label: {e}")))?;
        self.cache.invalidate_matching(|cache_key: &String| cache_key.contains(&key.snapshot_hash.to_string()));
        Ok(())
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }
}

fn clamp_granularity(granularity: u32, warnings: &mut Vec<Warning>) -> u32 {
    if granularity < MIN_GRANULARITY || granularity > MAX_GRANULARITY {
        warnings.push(Warning::new(
            "clamped_granularity",
            format!("granularity {granularity} clamped to [{MIN_GRANULARITY}, {MAX_GRANULARITY}]"),
        ));
    }
    granularity.clamp(MIN_GRANULARITY, MAX_GRANULARITY)
}

fn centroid(snapshot: &Snapshot, members: &[u32]) -> Vec<f32> {
    let n_dims = snapshot.n_dims();
    let mut sum = vec![0.0f32; n_dims];
    for &m in members {
        for (d, v) in snapshot.embedding_row(m as usize).iter().enumerate() {
            sum[d] += v;
        }
    }
    let count = members.len().max(1) as f32;
    for v in &mut sum {
        *v /= count;
    }
    sum
}

fn variance(snapshot: &Snapshot, members: &[u32], centroid: &[f32]) -> f32 {
    if members.is_empty() {
        return 0.0;
    }
    let sum: f32 = members
        .iter()
        .map(|&m| {
            snapshot
                .embedding_row(m as usize)
                .iter()
                .zip(centroid)
                .map(|(v, c)| (v - c).powi(2))
                .sum::<f32>()
        })
        .sum();
    sum / members.len() as f32
}

/// Expand highest-variance clusters breadth-first until `budget` is
/// reached, ties broken by the smaller numeric cluster id.
fn autofill(cut: &mut Cut, linkage: &crate::spectral::Linkage, snapshot: &Snapshot, budget: u32) {
    loop {
        if cut.len() as u32 >= budget {
            break;
        }
        // `cut` is a `BTreeMap`, so this iterates in ascending id order;
        // using a strict `>` below means the first-seen (smallest id)
        // cluster wins variance ties, matching the tie-break rule.
        let mut best: Option<(u32, f32)> = None;
        for (&id, members) in cut.iter() {
            if linkage.children(id).is_none() {
                continue;
            }
            let c = centroid(snapshot, members);
            let v = variance(snapshot, members, &c);
            if best.map(|(_, best_v)| v > best_v).unwrap_or(true) {
                best = Some((id, v));
            }
        }
        let Some((expand_id, _)) = best else {
            break;
        };
        let members = cut.remove(&expand_id).unwrap();
        if let Some((left, right)) = linkage.children(expand_id) {
            let (left_leaves, right_leaves) = split_by_subtree(linkage, left, &members);
            cut.insert(left, left_leaves);
            cut.insert(right, right_leaves);
        } else {
            cut.insert(expand_id, members);
            break;
        }
    }
}

fn split_by_subtree(linkage: &crate::spectral::Linkage, left: u32, members: &[u32]) -> (Vec<u32>, Vec<u32>) {
    let left_set = subtree_leaves(linkage, left);
    let mut left_leaves = Vec::new();
    let mut right_leaves = Vec::new();
    for &m in members {
        if left_set.contains(&m) {
            left_leaves.push(m);
        } else {
            right_leaves.push(m);
        }
    }
    (left_leaves, right_leaves)
}

fn subtree_leaves(linkage: &crate::spectral::Linkage, node_id: u32) -> BTreeSet<u32> {
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

fn find_parent(linkage: &crate::spectral::Linkage, base: &Cut, cluster_id: u32) -> Option<u32> {
    if !base.contains_key(&cluster_id) {
        return None;
    }
    for (i, row) in linkage.rows.iter().enumerate() {
        if row.left == cluster_id || row.right == cluster_id {
            return Some(linkage.num_leaves + i as u32);
        }
    }
    None
}

/// Memoization key for one `view()` call. Every field the returned
/// `ClusterView` depends on must appear here; omitting one means two
/// queries differing only in that field collide and one caller silently
/// gets the other's cached result.
fn cache_key(snapshot: &Snapshot, granularity: u32, query: &ClusterQuery) -> String {
    let mut expanded = query.expanded_set.clone();
    expanded.sort_unstable();
    let mut collapsed = query.collapsed_set.clone();
    collapsed.sort_unstable();
    format!(
        "{}/{}/ego={:?}/focus={:?}/exp={:?}/col={:?}/budget={}/autofill={}/wb={}/sb={}",
        snapshot.manifest.source_graph_hash,
        granularity,
        query.ego,
        query.focus_leaf,
        expanded,
        collapsed,
        query.budget,
        query.autofill,
        bucket_weight(query.weight_bucket),
        bucket_weight(query.signal_blend),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphLoader, InMemoryGraphLoader};
    use crate::graph::store::GraphStore;
    use crate::spectral::{SpectralConfig, SpectralEngine};
    use crate::store::InMemoryStore;
    use crate::types::{Direction, Provenance};

    fn account(id: &str, followers: u64) -> AccountView {
        AccountView {
            id: AccountId::resolved(id),
            username: id.to_string(),
            display_name: id.to_string(),
            follower_count: followers,
            following_count: 5,
            tweet_count: 0,
            like_count: 0,
            bio: None,
            provenance: Provenance::Archive,
            fetched_at: 0,
        }
    }

    fn edge(a: &str, b: &str) -> crate::types::Edge {
        crate::types::Edge {
            source: AccountId::resolved(a),
            target: AccountId::resolved(b),
            direction: Direction::Outbound,
            provenance: Provenance::Archive,
            weight: None,
            fetched_at: 0,
        }
    }

    async fn sample_graph_and_snapshot() -> (GraphHandle, Snapshot) {
        let accounts: Vec<_> = (0..8).map(|i| account(&i.to_string(), i as u64)).collect();
        let mut edges = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                if i != j {
                    edges.push(edge(&i.to_string(), &j.to_string()));
                }
            }
        }
        for i in 4..8 {
            for j in 4..8 {
                if i != j {
                    edges.push(edge(&i.to_string(), &j.to_string()));
                }
            }
        }
        edges.push(edge("0", "4"));
        edges.push(edge("4", "0"));

        let loader = InMemoryGraphLoader::new(accounts, edges);
        let handle = GraphStore.load(&loader).await.unwrap();
        let config = SpectralConfig {
            n_dims: 2,
            stability_runs: 1,
            ..Default::default()
        };
        let snapshot = SpectralEngine
            .build(&handle, &config, None, &crate::concurrency::CancelGuard::default())
            .unwrap();
        (handle, snapshot)
    }

    #[tokio::test]
    async fn view_respects_granularity_before_budget() {
        let (graph, snapshot) = sample_graph_and_snapshot().await;
        let store = Arc::new(InMemoryStore::new());
        let service = ClusterService::new(store, "ws");
        let query = ClusterQuery {
            granularity: 8,
            budget: 100,
            ..Default::default()
        };
        let view = service.view(&graph, &snapshot, &query).await.unwrap();
        assert!(view.clusters.len() <= 8);
    }

    #[tokio::test]
    async fn budget_collapses_expanded_nodes_lifo() {
        let (graph, snapshot) = sample_graph_and_snapshot().await;
        let store = Arc::new(InMemoryStore::new());
        let service = ClusterService::new(store, "ws");
        let base_view = service
            .view(
                &graph,
                &snapshot,
                &ClusterQuery {
                    granularity: 5,
                    budget: 100,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let first_id = base_view.clusters[0].id;

        let query = ClusterQuery {
            granularity: 5,
            budget: 5,
            expanded_set: vec![first_id],
            ..Default::default()
        };
        let view = service.view(&graph, &snapshot, &query).await.unwrap();
        assert!(view.clusters.len() as u32 <= 5);
    }

    #[tokio::test]
    async fn granularity_outside_range_is_clamped_with_warning() {
        let (graph, snapshot) = sample_graph_and_snapshot().await;
        let store = Arc::new(InMemoryStore::new());
        let service = ClusterService::new(store, "ws");
        let query = ClusterQuery {
            granularity: 1,
            budget: 100,
            ..Default::default()
        };
        let view = service.view(&graph, &snapshot, &query).await.unwrap();
        assert!(!view.warnings.is_empty());
    }
}
