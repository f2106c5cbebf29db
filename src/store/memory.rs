//! In-memory `Store` for testing and the CLI's `--fixture` mode.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::types::{AccountId, ClusterKey, CommunitySeed, Fingerprint, TagAssignment, TagAssignmentKey};

use super::Store;

#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryStoreError {
    #[error("tag assignment not found: {0:?}")]
    TagNotFound(TagAssignmentKey),
}

/// An in-memory `Store`, using `BTreeMap` for deterministic iteration order
/// (teacher's `InMemoryGraphStore` convention).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tags: RwLock<BTreeMap<TagAssignmentKey, TagAssignment>>,
    community_seeds: RwLock<BTreeMap<(String, String), CommunitySeed>>,
    fingerprints: RwLock<BTreeMap<AccountId, Fingerprint>>,
    cluster_labels: RwLock<BTreeMap<ClusterKey, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Error = InMemoryStoreError;

    async fn put_tag_assignment(&self, assignment: TagAssignment) -> Result<(), Self::Error> {
        let mut tags = self.tags.write();
        match tags.get_mut(&assignment.key) {
            Some(existing) => existing.merge_last_writer_wins(assignment),
            None => {
                tags.insert(assignment.key.clone(), assignment);
            }
        }
        Ok(())
    }

    async fn delete_tag_assignment(&self, key: &TagAssignmentKey) -> Result<(), Self::Error> {
        self.tags.write().remove(key);
        Ok(())
    }

    async fn list_tag_assignments(
        &self,
        workspace_id: &str,
        ego_id: &AccountId,
    ) -> Result<Vec<TagAssignment>, Self::Error> {
        Ok(self
            .tags
            .read()
            .values()
            .filter(|a| a.key.workspace_id == workspace_id && &a.key.ego_id == ego_id)
            .cloned()
            .collect())
    }

    async fn put_community_seed(&self, workspace_id: &str, seed: CommunitySeed) -> Result<(), Self::Error> {
        self.community_seeds
            .write()
            .insert((workspace_id.to_string(), seed.tag_key.clone()), seed);
        Ok(())
    }

    async fn list_community_seeds(&self, workspace_id: &str) -> Result<Vec<CommunitySeed>, Self::Error> {
        Ok(self
            .community_seeds
            .read()
            .iter()
            .filter(|((ws, _), _)| ws == workspace_id)
            .map(|(_, seed)| seed.clone())
            .collect())
    }

    async fn put_fingerprint(&self, fingerprint: Fingerprint) -> Result<(), Self::Error> {
        self.fingerprints.write().insert(fingerprint.account_id.clone(), fingerprint);
        Ok(())
    }

    async fn get_fingerprint(&self, account_id: &AccountId) -> Result<Option<Fingerprint>, Self::Error> {
        Ok(self.fingerprints.read().get(account_id).cloned())
    }

    async fn set_cluster_label(&self, key: &ClusterKey, label: String) -> Result<(), Self::Error> {
        self.cluster_labels.write().insert(key.clone(), label);
        Ok(())
    }

    async fn delete_cluster_label(&self, key: &ClusterKey) -> Result<(), Self::Error> {
        self.cluster_labels.write().remove(key);
        Ok(())
    }

    async fn get_cluster_label(&self, key: &ClusterKey) -> Result<Option<String>, Self::Error> {
        Ok(self.cluster_labels.read().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Polarity;

    fn assignment(ts: i64) -> TagAssignment {
        TagAssignment::new(
            "ws",
            AccountId::resolved("ego"),
            AccountId::resolved("acct"),
            "tag",
            Polarity::In,
            0.9,
            "alice",
            ts,
        )
    }

    #[tokio::test]
    async fn put_then_list_roundtrips() {
        let store = InMemoryStore::new();
        store.put_tag_assignment(assignment(1)).await.unwrap();
        let listed = store
            .list_tag_assignments("ws", &AccountId::resolved("ego"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn last_writer_wins_on_repeated_put() {
        let store = InMemoryStore::new();
        store.put_tag_assignment(assignment(1)).await.unwrap();
        let mut newer = assignment(5);
        newer.actor = "bob".into();
        store.put_tag_assignment(newer).await.unwrap();

        let listed = store
            .list_tag_assignments("ws", &AccountId::resolved("ego"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].actor, "bob");
    }

    #[tokio::test]
    async fn cluster_label_set_then_delete() {
        let store = InMemoryStore::new();
        let key = ClusterKey::new(crate::types::GraphHash::compute(&"g"), 10, 0.5, 3);
        store.set_cluster_label(&key, "Group A".to_string()).await.unwrap();
        assert_eq!(store.get_cluster_label(&key).await.unwrap(), Some("Group A".to_string()));
        store.delete_cluster_label(&key).await.unwrap();
        assert_eq!(store.get_cluster_label(&key).await.unwrap(), None);
    }
}
