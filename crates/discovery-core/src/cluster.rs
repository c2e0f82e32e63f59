use crate::ids::Gvr;
use crate::resource::Resource;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Narrow read-only view of the cluster the Discovery Engine depends on.
/// Deliberately excludes everything about constructing/authenticating a
/// `kube::Client` — that construction is an external collaborator (spec §1).
/// `discovery-resolve` provides the real implementation over `kube::Client`;
/// tests provide an in-memory fake (spec §8's `FakeCluster`).
#[async_trait]
pub trait ClusterReader: Send + Sync {
    async fn get(
        &self,
        gvr: &Gvr,
        kind: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Resource>, ClusterError>;

    async fn list(
        &self,
        gvr: &Gvr,
        kind: &str,
        namespace: Option<&str>,
        query: ListQuery,
    ) -> Result<Vec<Resource>, ClusterError>;

    /// Enumerates CustomResourceDefinitions whose group matches the registry's
    /// configured glob patterns (spec §4.2 dynamic mode).
    async fn list_crds(&self) -> Result<Vec<CrdSummary>, ClusterError>;
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub label_selector: Option<String>,
    /// Server-side `limit=1` for `stopOnFirst` (spec §4.6).
    pub limit: Option<u32>,
}

/// The subset of a CRD the Schema Registry's dynamic mode needs: its group,
/// served versions/kinds, scope, and raw OpenAPI v3 schema per version.
#[derive(Debug, Clone)]
pub struct CrdSummary {
    pub group: String,
    pub kind: String,
    pub plural: String,
    pub scope: crate::ids::Scope,
    /// version -> JSONSchemaProps-shaped value (`properties`, `required`, ...)
    pub versions: Vec<(String, Option<Value>)>,
}

/// Cluster-call outcomes the engine can recover from locally (spec §7).
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("request timed out")]
    Timeout,
    #[error("cluster error: {0}")]
    Other(String),
}

impl crate::status::FetchStatus {
    pub fn from_cluster_error(err: &ClusterError) -> Self {
        match err {
            ClusterError::NotFound => crate::status::FetchStatus::NotFound,
            ClusterError::Forbidden => crate::status::FetchStatus::Forbidden,
            ClusterError::Timeout => crate::status::FetchStatus::Timeout,
            ClusterError::Other(msg) => crate::status::FetchStatus::Error(msg.clone()),
        }
    }
}
