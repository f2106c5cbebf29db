//! Core data types for the graph analytics core.

pub mod account;
pub mod cluster;
pub mod edge;
pub mod error;
pub mod fingerprint;
pub mod graph_hash;
pub mod membership;
pub mod tag;

pub use account::{AccountId, AccountView, Provenance};
pub use cluster::{bucket_weight, ClusterEdge, ClusterKey, ClusterNode, LabelSource};
pub use edge::{Direction, Edge};
pub use error::{CoreError, ErrorKind, Warning};
pub use fingerprint::Fingerprint;
pub use graph_hash::GraphHash;
pub use membership::{MembershipMatrix, MembershipVector};
pub use tag::{CommunitySeed, Polarity, TagAssignment, TagAssignmentKey};
