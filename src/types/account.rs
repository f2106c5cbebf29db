//! Account identity and metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque account identifier.
///
/// Ids are externally sourced (from the archive fetcher or scraper), never
/// locally minted. A [`Shadow`](AccountId::Shadow) variant models a
/// temporary pre-resolution identity: a first-class variant of the id
/// type, resolved atomically once the real id is known.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountId {
    /// A stable, resolved account id.
    Resolved(String),
    /// A temporary id assigned before the real account id was known.
    Shadow(String),
}

impl AccountId {
    /// Create a resolved account id.
    pub fn resolved(id: impl Into<String>) -> Self {
        Self::Resolved(id.into())
    }

    /// Create a shadow account id.
    pub fn shadow(id: impl Into<String>) -> Self {
        Self::Shadow(id.into())
    }

    /// True if this id has not yet been resolved to a stable account id.
    pub fn is_shadow(&self) -> bool {
        matches!(self, Self::Shadow(_))
    }

    /// The raw string value, regardless of variant.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Resolved(s) | Self::Shadow(s) => s,
        }
    }

    /// Resolve a shadow id to a stable id in place, returning the prior value.
    ///
    /// Callers (the loader's resolution pass) use this to atomically swap a
    /// shadow id for its real id once discovered; referencing edges must be
    /// rewritten by the same pass.
    pub fn resolve(&mut self, real_id: impl Into<String>) -> AccountId {
        std::mem::replace(self, AccountId::Resolved(real_id.into()))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source of a record: where it came from, for provenance tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Provenance {
    /// From the bulk archive export.
    Archive,
    /// From live scraping.
    Scraped,
    /// A placeholder record created for a shadow id, not yet fully fetched.
    Shadow,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive => write!(f, "archive"),
            Self::Scraped => write!(f, "scraped"),
            Self::Shadow => write!(f, "shadow"),
        }
    }
}

/// Read-only account metadata, as served by `GraphStore::node_metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    /// Stable account id.
    pub id: AccountId,
    /// Current username (may be renamed without identity change).
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Follower count.
    pub follower_count: u64,
    /// Following count.
    pub following_count: u64,
    /// Tweet count.
    pub tweet_count: u64,
    /// Like count.
    pub like_count: u64,
    /// Optional bio text.
    pub bio: Option<String>,
    /// Where this record came from.
    pub provenance: Provenance,
    /// Unix timestamp when this record was fetched.
    pub fetched_at: i64,
}

impl AccountView {
    /// Stable sort key used throughout the core: followers desc, then
    /// username asc.
    pub fn member_sort_key(&self) -> (std::cmp::Reverse<u64>, &str) {
        (std::cmp::Reverse(self.follower_count), self.username.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_resolves_in_place() {
        let mut id = AccountId::shadow("tmp-1");
        assert!(id.is_shadow());
        let prior = id.resolve("acct-42");
        assert!(!id.is_shadow());
        assert_eq!(id.as_str(), "acct-42");
        assert_eq!(prior.as_str(), "tmp-1");
    }

    #[test]
    fn member_sort_orders_followers_desc_then_username_asc() {
        let mut views = vec![
            AccountView {
                id: AccountId::resolved("a"),
                username: "zed".into(),
                display_name: "Zed".into(),
                follower_count: 10,
                following_count: 0,
                tweet_count: 0,
                like_count: 0,
                bio: None,
                provenance: Provenance::Archive,
                fetched_at: 0,
            },
            AccountView {
                id: AccountId::resolved("b"),
                username: "amy".into(),
                display_name: "Amy".into(),
                follower_count: 10,
                following_count: 0,
                tweet_count: 0,
                like_count: 0,
                bio: None,
                provenance: Provenance::Archive,
                fetched_at: 0,
            },
        ];
        views.sort_by_key(|v| (std::cmp::Reverse(v.follower_count), v.username.clone()));
        assert_eq!(views[0].username, "amy");
    }
}
