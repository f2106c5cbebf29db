//! The `Store` port: durable persistence for `TagAssignment`,
//! `CommunitySeed`, `Fingerprint`, and cluster label overrides.
//!
//! A narrow async trait, one in-memory reference implementation for tests,
//! and an optional `sqlx`-backed implementation behind the `postgres`
//! feature. The core never talks to a database directly; it only calls
//! through this trait and a [`WorkspaceView`] read-through cache in front
//! of it, with every write followed by a cache invalidation for the
//! affected prefix.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod workspace_view;

use async_trait::async_trait;

use crate::types::{AccountId, ClusterKey, CommunitySeed, Fingerprint, TagAssignment, TagAssignmentKey};

/// Durable storage for everything the core does not own outright.
///
/// Writes are serialized per workspace by the implementation ("Writes to
/// TagAssignments are serialized per workspace; reads see the last
/// successful write").
#[async_trait]
pub trait Store: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Upsert a tag assignment with last-writer-wins semantics.
    async fn put_tag_assignment(&self, assignment: TagAssignment) -> Result<(), Self::Error>;

    async fn delete_tag_assignment(&self, key: &TagAssignmentKey) -> Result<(), Self::Error>;

    /// All tag assignments for one (workspace, ego) pair, used as
    /// `PropagationEngine` anchors.
    async fn list_tag_assignments(
        &self,
        workspace_id: &str,
        ego_id: &AccountId,
    ) -> Result<Vec<TagAssignment>, Self::Error>;

    async fn put_community_seed(&self, workspace_id: &str, seed: CommunitySeed) -> Result<(), Self::Error>;

    async fn list_community_seeds(&self, workspace_id: &str) -> Result<Vec<CommunitySeed>, Self::Error>;

    async fn put_fingerprint(&self, fingerprint: Fingerprint) -> Result<(), Self::Error>;

    async fn get_fingerprint(&self, account_id: &AccountId) -> Result<Option<Fingerprint>, Self::Error>;

    /// `clusters.label.set`: a workspace-scoped label override.
    async fn set_cluster_label(&self, key: &ClusterKey, label: String) -> Result<(), Self::Error>;

    /// `clusters.label.delete`: revert to the auto-label.
    async fn delete_cluster_label(&self, key: &ClusterKey) -> Result<(), Self::Error>;

    async fn get_cluster_label(&self, key: &ClusterKey) -> Result<Option<String>, Self::Error>;
}

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use workspace_view::WorkspaceView;
