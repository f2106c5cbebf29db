//! The graph layer: CSR adjacency, the `GraphLoader` ingestion port, and
//! `GraphStore`.

pub mod csr;
pub mod loader;
pub mod louvain;
pub mod store;

pub use csr::Csr;
pub use loader::{GraphLoader, InMemoryGraphLoader};
pub use louvain::{adjusted_rand_index, louvain_communities};
pub use store::{GraphHandle, GraphStore};
