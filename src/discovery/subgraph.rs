//! Bounded candidate sub-graph extraction.

use std::collections::BTreeSet;

use crate::concurrency::CancelGuard;
use crate::graph::GraphHandle;

pub const MAX_DEPTH: u32 = 2;
pub const NEIGHBOR_CAP: usize = 100;
pub const NODE_CAP: usize = 5000;

/// A bounded neighborhood around the seed set.
pub struct Subgraph {
    /// All nodes reached, including the seeds themselves.
    pub nodes: BTreeSet<u32>,
    /// Set when either a per-node neighbor cap or the total-node cap was
    /// hit before BFS naturally exhausted the frontier.
    pub truncated: bool,
}

/// BFS from `seeds` up to [`MAX_DEPTH`] hops, capping fan-out per node at
/// [`NEIGHBOR_CAP`] and the total node count at [`NODE_CAP`]. Polls
/// `cancel` between hops and between nodes within a hop ("between BFS
/// hops in DiscoveryEngine").
pub fn extract(graph: &GraphHandle, seeds: &[u32], cancel: &CancelGuard) -> Subgraph {
    let sym = graph.symmetric_adjacency(false);
    let mut visited: BTreeSet<u32> = seeds.iter().copied().collect();
    let mut frontier: Vec<u32> = seeds.to_vec();
    let mut truncated = false;

    for _ in 0..MAX_DEPTH {
        if cancel.should_stop() || visited.len() >= NODE_CAP {
            break;
        }
        let mut next = Vec::new();
        for &node in &frontier {
            if cancel.should_stop() {
                truncated = true;
                break;
            }
            let mut neighbors: Vec<u32> = sym.row(node).map(|(c, _)| c).collect();
            neighbors.sort_unstable();
            if neighbors.len() > NEIGHBOR_CAP {
                neighbors.truncate(NEIGHBOR_CAP);
                truncated = true;
            }
            for n in neighbors {
                if visited.len() >= NODE_CAP {
                    truncated = true;
                    break;
                }
                if visited.insert(n) {
                    next.push(n);
                }
            }
            if visited.len() >= NODE_CAP {
                truncated = true;
                break;
            }
        }
        frontier = next;
    }

    Subgraph { nodes: visited, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::GraphStore;
    use crate::graph::{GraphLoader, InMemoryGraphLoader};
    use crate::types::{AccountId, AccountView, Direction, Edge, Provenance};

    fn account(id: &str) -> AccountView {
        AccountView {
            id: AccountId::resolved(id),
            username: id.to_string(),
            display_name: id.to_string(),
            follower_count: 0,
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

    #[tokio::test]
    async fn depth_two_reaches_neighbors_of_neighbors() {
        let accounts: Vec<_> = ["a", "b", "c", "d"].iter().map(|s| account(s)).collect();
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "d")];
        let loader = InMemoryGraphLoader::new(accounts, edges);
        let handle = GraphStore.load(&loader).await.unwrap();
        let a = handle.node_index(&AccountId::resolved("a")).unwrap();
        let sub = subgraph_for(&handle, a);
        let d = handle.node_index(&AccountId::resolved("d")).unwrap();
        assert!(!sub.nodes.contains(&d)); // depth 2 from a reaches only b, c
    }

    fn subgraph_for(handle: &GraphHandle, seed: u32) -> Subgraph {
        extract(handle, &[seed], &CancelGuard::default())
    }
}
