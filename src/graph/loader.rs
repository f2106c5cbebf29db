//! The `GraphLoader` port: the seam between ingestion (ArchiveFetcher,
//! WebScraper, out of scope here) and `GraphStore::load`.

use async_trait::async_trait;

use crate::types::{AccountView, Edge};

/// Raw rows a loader hands to `GraphStore::load`.
///
/// Implementations merge multiple provenance sources (archive + scraped +
/// bulk blob) upstream of this trait; `GraphStore` only deduplicates and
/// validates what it is given.
#[async_trait]
pub trait GraphLoader: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch every account row to load.
    async fn load_accounts(&self) -> Result<Vec<AccountView>, Self::Error>;

    /// Fetch every edge row to load. May reference accounts not yet
    /// returned by `load_accounts` in the same call; `GraphStore::load`
    /// validates all edges against the full account set after both are
    /// fetched.
    async fn load_edges(&self) -> Result<Vec<Edge>, Self::Error>;
}

/// An in-memory `GraphLoader`, used by tests and the CLI's `--fixture` mode.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphLoader {
    pub accounts: Vec<AccountView>,
    pub edges: Vec<Edge>,
}

impl InMemoryGraphLoader {
    pub fn new(accounts: Vec<AccountView>, edges: Vec<Edge>) -> Self {
        Self { accounts, edges }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("in-memory loader never fails")]
pub struct Infallible;

#[async_trait]
impl GraphLoader for InMemoryGraphLoader {
    type Error = Infallible;

    async fn load_accounts(&self) -> Result<Vec<AccountView>, Self::Error> {
        Ok(self.accounts.clone())
    }

    async fn load_edges(&self) -> Result<Vec<Edge>, Self::Error> {
        Ok(self.edges.clone())
    }
}
