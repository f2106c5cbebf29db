//! `DiscoveryEngine`: composite-score account recommendation over a
//! bounded candidate neighborhood.

pub mod rate_limit;
pub mod request;
mod scoring;
mod subgraph;

pub use rate_limit::RateLimiter;
pub use request::{DiscoveryFilters, DiscoveryRequest, DiscoveryWeights};
pub use scoring::{SignalValue, Signals};

use std::collections::BTreeSet;
use std::time::Duration;

use crate::concurrency::CancelGuard;
use crate::graph::GraphHandle;
use crate::types::{AccountId, CoreError, MembershipMatrix, Warning};

use request::{MAX_LIMIT, MAX_OFFSET, MAX_SEEDS};

const PAGERANK_DAMPING: f32 = 0.85;
const PAGERANK_ITERATIONS: usize = 40;

/// One scored candidate, carrying every signal needed to reconstruct the
/// composite ("Explainability").
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub account_id: AccountId,
    pub composite: f32,
    pub signals: Signals,
}

/// The outcome of one `discovery.recommend` call.
#[derive(Debug, Clone)]
pub struct Recommendations {
    pub items: Vec<Recommendation>,
    /// Count of candidates surviving filters, before pagination.
    pub total_candidates: usize,
    pub warnings: Vec<Warning>,
}

/// Stateful entry point for `discovery.recommend`. Stateful only
/// in the sense that it owns the per-caller rate limiter; scoring itself is
/// pure given a `GraphHandle` and an optional `MembershipMatrix`.
pub struct DiscoveryEngine {
    rate_limiter: RateLimiter,
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self { rate_limiter: RateLimiter::default_limiter() }
    }
}

impl DiscoveryEngine {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self { rate_limiter: RateLimiter::new(capacity, window) }
    }

    /// `discover(request) -> Recommendations`.
    pub fn discover(
        &self,
        graph: &GraphHandle,
        matrix: Option<&MembershipMatrix>,
        request: &DiscoveryRequest,
        caller: &str,
        cancel: &CancelGuard,
    ) -> Result<Recommendations, CoreError> {
        self.rate_limiter.try_acquire(caller)?;

        if request.seeds.is_empty() || request.seeds.len() > MAX_SEEDS {
            return Err(CoreError::invalid_argument(format!(
                "seeds must be 1..={MAX_SEEDS}, got {}",
                request.seeds.len()
            )));
        }

        let mut warnings = Vec::new();

        if request.limit > MAX_LIMIT || request.offset > MAX_OFFSET {
            warnings.push(Warning::new(
                "invalid_pagination",
                format!("limit/offset exceed caps ({MAX_LIMIT}/{MAX_OFFSET}); returning an empty page"),
            ));
            return Ok(Recommendations { items: Vec::new(), total_candidates: 0, warnings });
        }

        let mut dropped_seeds = 0usize;
        let mut seed_indices = Vec::new();
        let mut seed_ids = Vec::new();
        for id in &request.seeds {
            match graph.node_index(id) {
                Some(idx) => {
                    seed_indices.push(idx);
                    seed_ids.push(id.clone());
                }
                None => dropped_seeds += 1,
            }
        }
        if dropped_seeds > 0 {
            warnings.push(Warning::new(
                "seeds_dropped",
                format!("{dropped_seeds} seed id(s) did not resolve to a known account"),
            ));
        }
        if seed_indices.is_empty() {
            return Err(CoreError::invalid_argument("no seeds resolved to known accounts"));
        }

        if cancel.should_stop() {
            return Err(CoreError::cancelled());
        }

        let sub = subgraph::extract(graph, &seed_indices, cancel);
        if sub.truncated {
            warnings.push(Warning::new(
                "subgraph_truncated",
                "candidate sub-graph hit a size cap before breadth-first search completed",
            ));
        }

        if cancel.should_stop() {
            return Err(CoreError::cancelled());
        }

        let seed_set: BTreeSet<u32> = seed_indices.iter().copied().collect();
        let candidate_nodes: Vec<u32> =
            sub.nodes.iter().copied().filter(|n| !seed_set.contains(n)).collect();

        let weights = request.weights.normalized();
        let max_distance = request.filters.max_distance.unwrap_or(request::DEFAULT_MAX_DISTANCE);

        let following = scoring::seeds_following(graph, &seed_indices);
        let followers = scoring::followers_index(graph);
        let mutual_graph = scoring::build_mutual_graph(graph, &sub.nodes);
        let distances = scoring::seed_distances(&mutual_graph, &seed_indices);

        let subgraph_nodes: Vec<u32> = sub.nodes.iter().copied().collect();
        let pagerank_raw =
            scoring::personalized_pagerank(graph, &subgraph_nodes, &seed_indices, PAGERANK_DAMPING, PAGERANK_ITERATIONS);
        let pagerank_norm = scoring::normalize_pagerank(&pagerank_raw, &candidate_nodes);

        let single_seed = seed_indices.len() == 1;
        let min_overlap = request.filters.min_overlap.map(|m| m.min(seed_indices.len() as f32).max(0.0));

        let mut scored: Vec<Recommendation> = Vec::with_capacity(candidate_nodes.len());
        for &c in &candidate_nodes {
            if cancel.should_stop() {
                return Err(CoreError::cancelled());
            }
            let account = graph.account_at(c);

            if !request.filters.include_shadow && account.id.is_shadow() {
                continue;
            }
            if let Some(min_f) = request.filters.min_followers {
                if account.follower_count < min_f {
                    continue;
                }
            }
            if let Some(max_f) = request.filters.max_followers {
                if account.follower_count > max_f {
                    continue;
                }
            }
            if single_seed && request.filters.exclude_following && following.contains(&c) {
                continue;
            }

            let followers_of_c = followers.get(&c).cloned().unwrap_or_default();
            let overlap = scoring::neighbor_overlap(&following, &followers_of_c);
            let community = scoring::community_affinity(matrix, &seed_ids, &account.id);
            let distance = distances.get(&c).copied();
            let path = scoring::path_distance_signal(distance, max_distance);
            let pagerank = pagerank_norm.get(&c).copied().unwrap_or_default();

            if let Some(min_o) = min_overlap {
                if overlap.raw < min_o {
                    continue;
                }
            }
            if distance.map(|d| d > max_distance).unwrap_or(true) && request.filters.max_distance.is_some() {
                continue;
            }

            if !request.filters.include_communities.is_empty() || !request.filters.exclude_communities.is_empty() {
                let community_key = matrix.and_then(|m| {
                    let row = m.get(&account.id)?;
                    if row.abstain {
                        return None;
                    }
                    let (idx, _) = row.argmax()?;
                    m.community_keys.get(idx)
                });
                if !request.filters.include_communities.is_empty() {
                    match community_key {
                        Some(key) if request.filters.include_communities.iter().any(|c| c == key) => {}
                        _ => continue,
                    }
                }
                if let Some(key) = community_key {
                    if request.filters.exclude_communities.iter().any(|c| c == key) {
                        continue;
                    }
                }
            }

            let signals = Signals { neighbor_overlap: overlap, community, path_distance: path, pagerank };
            let composite = signals.neighbor_overlap.normalized * weights.neighbor_overlap
                + signals.pagerank.normalized * weights.pagerank
                + signals.community.normalized * weights.community
                + signals.path_distance.normalized * weights.path_distance;

            scored.push(Recommendation { account_id: account.id.clone(), composite, signals });
        }

        scored.sort_by(|a, b| {
            b.composite
                .partial_cmp(&a.composite)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });

        let total_candidates = scored.len();
        let page: Vec<Recommendation> = scored.into_iter().skip(request.offset).take(request.limit).collect();

        Ok(Recommendations { items: page, total_candidates, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::GraphStore;
    use crate::graph::{GraphLoader, InMemoryGraphLoader};
    use crate::types::{AccountView, Direction, Edge, Provenance};

    fn account(id: &str, followers: u64) -> AccountView {
        AccountView {
            id: AccountId::resolved(id),
            username: id.to_string(),
            display_name: id.to_string(),
            follower_count: followers,
            following_count: 0,
            tweet_count: 0,
            like_count: 0,
            bio: None,
            provenance: Provenance::Archive,
            fetched_at: 0,
        }
    }

    fn edge(a: &str, b: &str) -> Edge {
        Edge {
            source: AccountId::resolved(a),
            target: AccountId::resolved(b),
            direction: Direction::Outbound,
            provenance: Provenance::Archive,
            weight: None,
            fetched_at: 0,
        }
    }

    async fn star_graph() -> GraphHandle {
        // seed "hub" follows a,b,c; d is two hops out via a.
        let accounts = vec![
            account("hub", 0),
            account("a", 10),
            account("b", 5),
            account("c", 1),
            account("d", 0),
        ];
        let edges = vec![
            edge("hub", "a"),
            edge("hub", "b"),
            edge("hub", "c"),
            edge("a", "d"),
        ];
        let loader = InMemoryGraphLoader::new(accounts, edges);
        GraphStore.load(&loader).await.unwrap()
    }

    #[tokio::test]
    async fn recommends_candidates_sorted_by_composite() {
        let graph = star_graph().await;
        let engine = DiscoveryEngine::default();
        let request = DiscoveryRequest { seeds: vec![AccountId::resolved("hub")], ..Default::default() };
        let result = engine
            .discover(&graph, None, &request, "tester", &CancelGuard::default())
            .unwrap();
        assert!(!result.items.is_empty());
        for pair in result.items.windows(2) {
            assert!(pair[0].composite >= pair[1].composite);
        }
    }

    #[tokio::test]
    async fn zero_resolved_seeds_is_rejected() {
        let graph = star_graph().await;
        let engine = DiscoveryEngine::default();
        let request = DiscoveryRequest { seeds: vec![AccountId::resolved("ghost")], ..Default::default() };
        let err = engine
            .discover(&graph, None, &request, "tester", &CancelGuard::default())
            .unwrap_err();
        assert_eq!(err.kind, crate::types::ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn oversized_seed_list_is_rejected() {
        let graph = star_graph().await;
        let engine = DiscoveryEngine::default();
        let seeds = (0..(MAX_SEEDS + 1)).map(|i| AccountId::resolved(i.to_string())).collect();
        let request = DiscoveryRequest { seeds, ..Default::default() };
        let err = engine
            .discover(&graph, None, &request, "tester", &CancelGuard::default())
            .unwrap_err();
        assert_eq!(err.kind, crate::types::ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn rate_limit_rejects_after_capacity() {
        let graph = star_graph().await;
        let engine = DiscoveryEngine::new(1, Duration::from_secs(60));
        let request = DiscoveryRequest { seeds: vec![AccountId::resolved("hub")], ..Default::default() };
        assert!(engine.discover(&graph, None, &request, "tester", &CancelGuard::default()).is_ok());
        let err = engine
            .discover(&graph, None, &request, "tester", &CancelGuard::default())
            .unwrap_err();
        assert_eq!(err.kind, crate::types::ErrorKind::RateLimited);
    }
}
