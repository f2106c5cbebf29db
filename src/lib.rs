//! # graph-analytics-core
//!
//! A social-graph analytics core: a directed follow graph, spectral
//! embeddings of it, interactive hierarchical cluster views, multi-class
//! label propagation from human-supplied anchors, and composite-score
//! account discovery.
//!
//! ## Core Contract
//!
//! 1. `GraphStore` loads a canonical, deduplicated, content-hashed graph
//!    from any [`graph::GraphLoader`] (archive export, scraper, or an
//!    in-memory fixture).
//! 2. `SpectralEngine` embeds that graph into a normalized-Laplacian
//!    eigenspace and derives a Ward dendrogram over it (a `Snapshot`).
//! 3. `ClusterService` serves budget-constrained, interactive views over a
//!    snapshot's dendrogram, with workspace-scoped label overrides.
//! 4. `PropagationEngine` spreads human-supplied per-community anchors
//!    across the graph via a Gaussian-random-field harmonic solve.
//! 5. `DiscoveryEngine` ranks candidate accounts against a seed set with a
//!    composite, explainable score.
//!
//! ## Architecture
//!
//! ```text
//! GraphLoader → GraphStore → GraphHandle ─┬─→ SpectralEngine → Snapshot → ClusterService
//!                                         ├─→ PropagationEngine → MembershipMatrix
//!                                         └─→ DiscoveryEngine
//! ```
//!
//! Every engine is a stateless (or narrowly-stateful, e.g. rate limiting)
//! unit over an explicitly passed `GraphHandle`/`Snapshot`/config; there
//! are no module-level statics or singletons.
//!
//! ## Determinism Guarantees
//!
//! - Same loader inputs → identical `GraphHash`.
//! - Node ordering is fixed at load time (accounts sorted by `AccountId`).
//! - `AnchorSet`/config content hashes feed into every derived artifact's
//!   `version_key`, so a snapshot or membership matrix can always be
//!   checked for staleness against the graph that produced it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod canonical;
pub mod cluster;
pub mod concurrency;
pub mod config;
pub mod discovery;
pub mod graph;
pub mod propagation;
pub mod spectral;
pub mod store;
pub mod types;

pub use cache::{CacheConfig, CacheStats, MetricsCache};
pub use cluster::{ClusterQuery, ClusterService, ClusterView, ClusterViewMeta, CollapsePreview, ExpandPreview, MembersPage, PreviewResult};
pub use concurrency::{CancelGuard, CancelToken, Deadline, ProgressCallback, ProgressUpdate};
pub use config::CoreConfig;
pub use discovery::{DiscoveryEngine, DiscoveryFilters, DiscoveryRequest, DiscoveryWeights, RateLimiter, Recommendation, Recommendations};
pub use graph::{adjusted_rand_index, louvain_communities, Csr, GraphHandle, GraphLoader, GraphStore, InMemoryGraphLoader};
pub use propagation::{AnchorSet, Diagnostics, PropagationConfig, PropagationEngine, PropagationResult};
pub use spectral::{Linkage as DendrogramLinkage, LinkageRow, Manifest, Snapshot, SnapshotLoader, SpectralConfig, SpectralEngine};
pub use store::{InMemoryStore, Store, WorkspaceView};
#[cfg(feature = "postgres")]
pub use store::PostgresStore;
pub use types::{
    bucket_weight, AccountId, AccountView, ClusterEdge, ClusterKey, ClusterNode, CommunitySeed, CoreError,
    Direction, Edge, ErrorKind, Fingerprint, GraphHash, LabelSource, MembershipMatrix, MembershipVector, Polarity,
    Provenance, TagAssignment, TagAssignmentKey, Warning,
};

/// Schema version for every persisted/serialized type in this crate.
/// Increment on breaking changes to any on-disk or wire type.
pub const SCHEMA_VERSION: &str = "1.0.0";
