//! A workspace-scoped, read-through view over a [`Store`] (Ownership:
//! "the core holds a workspace-scoped read-through view that invalidates
//! on write").

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheConfig, MetricsCache};
use crate::types::{AccountId, CommunitySeed, TagAssignment};

use super::Store;

/// Wraps any [`Store`] with a per-workspace tag-assignment cache. Every
/// write goes through to the underlying store and then evicts the
/// affected workspace's cached reads ("every write is followed by a
/// cache invalidation for the affected prefix").
pub struct WorkspaceView<S: Store> {
    store: Arc<S>,
    tag_cache: MetricsCache<(String, AccountId), Vec<TagAssignment>>,
    seed_cache: MetricsCache<String, Vec<CommunitySeed>>,
}

impl<S: Store> WorkspaceView<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            tag_cache: MetricsCache::new(CacheConfig::new(256, Duration::from_secs(300))),
            seed_cache: MetricsCache::new(CacheConfig::new(256, Duration::from_secs(300))),
        }
    }

    pub async fn tag_assignments(
        &self,
        workspace_id: &str,
        ego_id: &AccountId,
    ) -> Result<Vec<TagAssignment>, S::Error> {
        let key = (workspace_id.to_string(), ego_id.clone());
        if let Some(cached) = self.tag_cache.get(&key) {
            return Ok(cached);
        }
        let fetched = self.store.list_tag_assignments(workspace_id, ego_id).await?;
        self.tag_cache.put(key, fetched.clone());
        Ok(fetched)
    }

    pub async fn community_seeds(&self, workspace_id: &str) -> Result<Vec<CommunitySeed>, S::Error> {
        if let Some(cached) = self.seed_cache.get(&workspace_id.to_string()) {
            return Ok(cached);
        }
        let fetched = self.store.list_community_seeds(workspace_id).await?;
        self.seed_cache.put(workspace_id.to_string(), fetched.clone());
        Ok(fetched)
    }

    /// Write through and invalidate this workspace's cached reads.
    pub async fn put_tag_assignment(&self, assignment: TagAssignment) -> Result<(), S::Error> {
        let workspace_id = assignment.key.workspace_id.clone();
        self.store.put_tag_assignment(assignment).await?;
        self.tag_cache.invalidate_matching(|(ws, _)| ws == &workspace_id);
        Ok(())
    }

    pub async fn put_community_seed(&self, workspace_id: &str, seed: CommunitySeed) -> Result<(), S::Error> {
        self.store.put_community_seed(workspace_id, seed).await?;
        self.seed_cache.invalidate_matching(|ws| ws == workspace_id);
        Ok(())
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
