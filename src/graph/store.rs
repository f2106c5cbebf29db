//! `GraphStore`: materializes and exposes the canonical directed follow
//! graph.

use std::collections::BTreeMap;

use crate::types::{AccountId, AccountView, CoreError, Edge, GraphHash};
use super::csr::Csr;
use super::loader::GraphLoader;

/// An immutable, loaded graph.
///
/// Owns the canonical Account/Edge arrays exclusively; every other
/// component holds only a read-only `&GraphHandle` or a cheap
/// `Arc<GraphHandle>` clone. Node ordering is fixed at load time (accounts
/// sorted by [`AccountId`]) and never changes for the lifetime of the
/// handle: reordering would require a fresh `load`, which produces a new
/// [`GraphHash`] and invalidates every downstream artifact.
#[derive(Debug, Clone)]
pub struct GraphHandle {
    accounts: Vec<AccountView>,
    index: BTreeMap<AccountId, u32>,
    edges: Vec<Edge>,
    hash: GraphHash,
}

impl GraphHandle {
    /// Number of nodes.
    pub fn num_nodes(&self) -> u32 {
        self.accounts.len() as u32
    }

    /// Dense index of an account id, if loaded.
    pub fn node_index(&self, id: &AccountId) -> Option<u32> {
        self.index.get(id).copied()
    }

    /// The account id at a dense index.
    pub fn account_at(&self, idx: u32) -> &AccountView {
        &self.accounts[idx as usize]
    }

    /// `node_metadata(id) -> AccountView`.
    pub fn node_metadata(&self, id: &AccountId) -> Option<&AccountView> {
        self.index.get(id).map(|&i| &self.accounts[i as usize])
    }

    /// All loaded edges, in canonical (source, target, direction) order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// All loaded accounts, in stable (sorted-by-id) order.
    pub fn accounts(&self) -> &[AccountView] {
        &self.accounts
    }

    /// Deterministic content hash, used as a cache salt and snapshot
    /// validator.
    pub fn hash(&self) -> GraphHash {
        self.hash
    }

    /// `directed_adjacency() -> CSR<u32>`: a compressed-sparse-row
    /// structure with stable row ordering matching the node-id index.
    /// Every loaded edge contributes one directed `source -> target` arc,
    /// regardless of its `direction` tag (that field is ingestion
    /// provenance, not adjacency semantics).
    pub fn directed_adjacency(&self) -> Csr<u32> {
        let triples = self
            .edges
            .iter()
            .filter_map(|e| {
                let s = self.node_index(&e.source)?;
                let t = self.node_index(&e.target)?;
                Some((s, t, 1u32))
            })
            .collect();
        Csr::from_triples(self.num_nodes(), triples)
    }

    /// `symmetric_adjacency(weighted) -> CSR<f32>`: `(A + Aᵀ)/2`.
    /// Isolated nodes keep a self-loop placeholder (weight `1.0`) so the
    /// normalized Laplacian never divides by zero.
    pub fn symmetric_adjacency(&self, weighted: bool) -> Csr<f32> {
        let n = self.num_nodes();
        let mut accum: BTreeMap<(u32, u32), f32> = BTreeMap::new();

        for e in &self.edges {
            let (Some(s), Some(t)) = (self.node_index(&e.source), self.node_index(&e.target)) else {
                continue;
            };
            if s == t {
                continue;
            }
            let w = if weighted { e.weight.unwrap_or(1.0) } else { 1.0 };
            let half = w / 2.0;
            *accum.entry((s, t)).or_default() += half;
            *accum.entry((t, s)).or_default() += half;
        }

        let mut has_edge = vec![false; n as usize];
        for (&(s, t), _) in &accum {
            has_edge[s as usize] = true;
            has_edge[t as usize] = true;
        }
        for (i, present) in has_edge.iter().enumerate() {
            if !present {
                accum.insert((i as u32, i as u32), 1.0);
            }
        }

        let triples = accum.into_iter().map(|((s, t), w)| (s, t, w)).collect();
        Csr::from_triples(n, triples)
    }

    /// `mutual_subgraph() -> CSR<u32>`: edges present in both
    /// directions. An edge `(i, j)` is mutual iff both `(i, j)` and
    /// `(j, i)` exist in the directed graph, independent of `direction`
    /// tags.
    pub fn mutual_subgraph(&self) -> Csr<u32> {
        let directed: std::collections::BTreeSet<(u32, u32)> = self
            .edges
            .iter()
            .filter_map(|e| Some((self.node_index(&e.source)?, self.node_index(&e.target)?)))
            .collect();

        let triples = directed
            .iter()
            .filter(|(s, t)| s != t && directed.contains(&(*t, *s)))
            .map(|&(s, t)| (s, t, 1u32))
            .collect();

        Csr::from_triples(self.num_nodes(), triples)
    }
}

/// Loads and materializes the canonical graph.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphStore;

impl GraphStore {
    /// `load(source) -> GraphHandle`: all-or-nothing; partial loads never
    /// become visible.
    pub async fn load<L: GraphLoader>(&self, loader: &L) -> Result<GraphHandle, CoreError> {
        let raw_accounts = loader
            .load_accounts()
            .await
            .map_err(|e| CoreError::internal(format!("loader failed to fetch accounts: {e}")))?;
        let raw_edges = loader
            .load_edges()
            .await
            .map_err(|e| CoreError::internal(format!("loader failed to fetch edges: {e}")))?;

        // Merge duplicate account rows across provenance sources, last
        // `fetched_at` wins.
        let mut accounts_by_id: BTreeMap<AccountId, AccountView> = BTreeMap::new();
        for account in raw_accounts {
            match accounts_by_id.get(&account.id) {
                Some(existing) if existing.fetched_at > account.fetched_at => {}
                _ => {
                    accounts_by_id.insert(account.id.clone(), account);
                }
            }
        }

        // Validate: every edge must reference a known account.
        let mut dangling: Vec<String> = Vec::new();
        for e in &raw_edges {
            if !accounts_by_id.contains_key(&e.source) {
                dangling.push(format!("{} (source)", e.source));
            }
            if !accounts_by_id.contains_key(&e.target) {
                dangling.push(format!("{} (target)", e.target));
            }
        }
        if !dangling.is_empty() {
            return Err(CoreError::invalid_argument(format!(
                "{} edge(s) reference accounts missing from the loaded graph",
                dangling.len()
            ))
            .with_context_ids(dangling));
        }

        // Deduplicate edges by (source, target, direction); latest
        // `fetched_at` wins.
        let mut edges_by_key: BTreeMap<(AccountId, AccountId, crate::types::Direction), Edge> =
            BTreeMap::new();
        for e in raw_edges {
            let key = e.dedup_key();
            match edges_by_key.get(&key) {
                Some(existing) if existing.fetched_at > e.fetched_at => {}
                _ => {
                    edges_by_key.insert(key, e);
                }
            }
        }

        let accounts: Vec<AccountView> = accounts_by_id.into_values().collect();
        let index: BTreeMap<AccountId, u32> = accounts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i as u32))
            .collect();
        let mut edges: Vec<Edge> = edges_by_key.into_values().collect();
        edges.sort();

        let hash_input: Vec<(String, String, String)> = edges
            .iter()
            .map(|e| (e.source.to_string(), e.target.to_string(), format!("{:?}", e.direction)))
            .collect();
        let account_ids: Vec<String> = accounts.iter().map(|a| a.id.to_string()).collect();
        let hash = GraphHash::compute(&(account_ids, hash_input));

        tracing::info!(
            num_accounts = accounts.len(),
            num_edges = edges.len(),
            graph_hash = %hash,
            "graph loaded"
        );

        Ok(GraphHandle {
            accounts,
            index,
            edges,
            hash,
        })
    }
}
