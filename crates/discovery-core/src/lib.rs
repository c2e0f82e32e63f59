//! Core data model, error taxonomy, cluster-read contract, and
//! configuration shared by every crate in the kubecore discovery engine.

pub mod cluster;
pub mod config;
pub mod error;
pub mod graph_model;
pub mod ids;
pub mod invocation;
pub mod resource;
pub mod schema;
pub mod status;

pub use cluster::{ClusterError, ClusterReader, CrdSummary, ListQuery};
pub use config::{RegistryMode, RegistrySettings};
pub use error::{DiscoveryError, Result};
pub use graph_model::{Cycle, DiscoveryHop, ResourceEdge, ResourceNode, Source};
pub use ids::{DedupKey, Gvk, Gvr, ResourceId, Scope};
pub use invocation::{Request, Response, ScopeFilterConfig};
pub use resource::Resource;
pub use schema::{DetectionMethod, ReferenceField, RefType, SchemaDescriptor};
pub use status::{FetchStatus, TerminationReason};

use uuid::Uuid;

/// Correlates one `discover()` call's log lines and summary end to end
/// (SPEC_FULL §3 ambient addition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InvocationId(pub Uuid);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
