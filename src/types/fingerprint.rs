//! Per-account feature fingerprints, consumed as an optional alternate
//! embedding basis.

use serde::{Deserialize, Serialize};

use super::account::AccountId;

/// A pre-computed per-account feature vector.
///
/// Produced entirely outside the core (tweet/like classification is an
/// explicit Non-goal); the core only consumes these as an optional input
/// feature for discovery/community-affinity scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub account_id: AccountId,
    /// Distribution over posted-tweet categories.
    pub posted_tweet_distribution: Vec<f32>,
    /// Distribution over liked-tweet categories.
    pub liked_tweet_distribution: Vec<f32>,
    /// Graph-derived features (degree, clustering coefficient, etc.).
    pub graph_features: Vec<f32>,
    /// Version tag of whatever process produced this fingerprint.
    pub prompt_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_carries_account_identity() {
        let fp = Fingerprint {
            account_id: AccountId::resolved("x"),
            posted_tweet_distribution: vec![0.5, 0.5],
            liked_tweet_distribution: vec![1.0],
            graph_features: vec![0.1, 0.2],
            prompt_version: "v1".into(),
        };
        assert_eq!(fp.account_id, AccountId::resolved("x"));
    }
}
