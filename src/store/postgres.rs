//! PostgreSQL-backed `Store` for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

use crate::types::{
    AccountId, ClusterKey, CommunitySeed, Fingerprint, Polarity, TagAssignment, TagAssignmentKey,
};

use super::Store;

/// Configuration for the PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/graph_analytics".to_string()),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            max_lifetime_secs: std::env::var("DB_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// PostgreSQL-backed `Store`. Queries the `tags`, `community_seeds`,
/// `fingerprints`, and `cluster_labels` tables.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Error = sqlx::Error;

    async fn put_tag_assignment(&self, assignment: TagAssignment) -> Result<(), Self::Error> {
        let polarity = match assignment.polarity {
            Polarity::In => "in",
            Polarity::NotIn => "not_in",
        };
        sqlx::query(
            r#"
            INSERT INTO tags (workspace_id, ego_id, account_id, tag_key, polarity, confidence, actor, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (workspace_id, ego_id, account_id, tag_key)
            DO UPDATE SET polarity = EXCLUDED.polarity, confidence = EXCLUDED.confidence,
                          actor = EXCLUDED.actor, updated_at = EXCLUDED.updated_at
            WHERE tags.updated_at <= EXCLUDED.updated_at
            "#,
        )
        .bind(&assignment.key.workspace_id)
        .bind(assignment.key.ego_id.as_str())
        .bind(assignment.key.account_id.as_str())
        .bind(&assignment.key.tag_key)
        .bind(polarity)
        .bind(assignment.confidence)
        .bind(&assignment.actor)
        .bind(assignment.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_tag_assignment(&self, key: &TagAssignmentKey) -> Result<(), Self::Error> {
        sqlx::query(
            "DELETE FROM tags WHERE workspace_id = $1 AND ego_id = $2 AND account_id = $3 AND tag_key = $4",
        )
        .bind(&key.workspace_id)
        .bind(key.ego_id.as_str())
        .bind(key.account_id.as_str())
        .bind(&key.tag_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_tag_assignments(
        &self,
        workspace_id: &str,
        ego_id: &AccountId,
    ) -> Result<Vec<TagAssignment>, Self::Error> {
        let rows = sqlx::query(
            "SELECT account_id, tag_key, polarity, confidence, actor, updated_at
             FROM tags WHERE workspace_id = $1 AND ego_id = $2
             ORDER BY account_id, tag_key",
        )
        .bind(workspace_id)
        .bind(ego_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let polarity_str: String = row.get("polarity");
                let polarity = if polarity_str == "in" { Polarity::In } else { Polarity::NotIn };
                TagAssignment::new(
                    workspace_id,
                    ego_id.clone(),
                    AccountId::resolved(row.get::<String, _>("account_id")),
                    row.get::<String, _>("tag_key"),
                    polarity,
                    row.get("confidence"),
                    row.get::<String, _>("actor"),
                    row.get("updated_at"),
                )
            })
            .collect())
    }

    async fn put_community_seed(&self, workspace_id: &str, seed: CommunitySeed) -> Result<(), Self::Error> {
        let weights = serde_json::to_value(&seed.prior_weights).unwrap_or_default();
        sqlx::query(
            "INSERT INTO community_seeds (workspace_id, tag_key, label, color, prior_weights)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (workspace_id, tag_key)
             DO UPDATE SET label = EXCLUDED.label, color = EXCLUDED.color, prior_weights = EXCLUDED.prior_weights",
        )
        .bind(workspace_id)
        .bind(&seed.tag_key)
        .bind(&seed.label)
        .bind(&seed.color)
        .bind(weights)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_community_seeds(&self, workspace_id: &str) -> Result<Vec<CommunitySeed>, Self::Error> {
        let rows = sqlx::query(
            "SELECT tag_key, label, color, prior_weights FROM community_seeds
             WHERE workspace_id = $1 ORDER BY tag_key",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let weights_json: serde_json::Value = row.get("prior_weights");
                let prior_weights = serde_json::from_value(weights_json).unwrap_or_default();
                CommunitySeed {
                    tag_key: row.get("tag_key"),
                    color: row.get("color"),
                    label: row.get("label"),
                    prior_weights,
                }
            })
            .collect())
    }

    async fn put_fingerprint(&self, fingerprint: Fingerprint) -> Result<(), Self::Error> {
        sqlx::query(
            "INSERT INTO fingerprints (account_id, posted_tweet_distribution, liked_tweet_distribution, graph_features, prompt_version)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (account_id) DO UPDATE SET
                posted_tweet_distribution = EXCLUDED.posted_tweet_distribution,
                liked_tweet_distribution = EXCLUDED.liked_tweet_distribution,
                graph_features = EXCLUDED.graph_features,
                prompt_version = EXCLUDED.prompt_version",
        )
        .bind(fingerprint.account_id.as_str())
        .bind(&fingerprint.posted_tweet_distribution)
        .bind(&fingerprint.liked_tweet_distribution)
        .bind(&fingerprint.graph_features)
        .bind(&fingerprint.prompt_version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_fingerprint(&self, account_id: &AccountId) -> Result<Option<Fingerprint>, Self::Error> {
        let row = sqlx::query(
            "SELECT posted_tweet_distribution, liked_tweet_distribution, graph_features, prompt_version
             FROM fingerprints WHERE account_id = $1",
        )
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Fingerprint {
            account_id: account_id.clone(),
            posted_tweet_distribution: row.get("posted_tweet_distribution"),
            liked_tweet_distribution: row.get("liked_tweet_distribution"),
            graph_features: row.get("graph_features"),
            prompt_version: row.get("prompt_version"),
        }))
    }

    async fn set_cluster_label(&self, key: &ClusterKey, label: String) -> Result<(), Self::Error> {
        sqlx::query(
            "INSERT INTO cluster_labels (snapshot_hash, granularity, weight_bucket, cluster_id, label)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (snapshot_hash, granularity, weight_bucket, cluster_id)
             DO UPDATE SET label = EXCLUDED.label",
        )
        .bind(key.snapshot_hash.to_hex())
        .bind(key.granularity as i64)
        .bind(key.weight_bucket as i16)
        .bind(key.cluster_id as i64)
        .bind(label)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_cluster_label(&self, key: &ClusterKey) -> Result<(), Self::Error> {
        sqlx::query(
            "DELETE FROM cluster_labels WHERE snapshot_hash = $1 AND granularity = $2 AND weight_bucket = $3 AND cluster_id = $4",
        )
        .bind(key.snapshot_hash.to_hex())
        .bind(key.granularity as i64)
        .bind(key.weight_bucket as i16)
        .bind(key.cluster_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_cluster_label(&self, key: &ClusterKey) -> Result<Option<String>, Self::Error> {
        let row = sqlx::query(
            "SELECT label FROM cluster_labels WHERE snapshot_hash = $1 AND granularity = $2 AND weight_bucket = $3 AND cluster_id = $4",
        )
        .bind(key.snapshot_hash.to_hex())
        .bind(key.granularity as i64)
        .bind(key.weight_bucket as i16)
        .bind(key.cluster_id as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row.get("label")))
    }
}
