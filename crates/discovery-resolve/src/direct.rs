//! C5 — Phase-1 Direct Resolver (spec §4.5).

use crate::kinds;
use discovery_core::invocation::ResourceRequest;
use discovery_core::{ClusterError, ClusterReader, FetchStatus, Gvk, Gvr, Resource};
use std::sync::Arc;
use std::time::Duration;

pub struct DirectResolver {
    cluster: Arc<dyn ClusterReader>,
}

impl DirectResolver {
    pub fn new(cluster: Arc<dyn ClusterReader>) -> Self {
        Self { cluster }
    }

    /// `Resolve(req) -> (Resource, status)`. A single GET, translated into a
    /// `FetchStatus` rather than propagated as an error — callers decide
    /// whether a non-success status is fatal based on `req.optional`.
    pub async fn resolve(&self, req: &ResourceRequest, per_request_timeout: Duration) -> (Option<Resource>, FetchStatus) {
        let Some(api_version) = req.api_version.as_deref() else {
            return (None, FetchStatus::Error("direct fetch requires apiVersion".into()));
        };
        let Some(kind) = req.kind.as_deref() else {
            return (None, FetchStatus::Error("direct fetch requires kind".into()));
        };
        let Some(name) = req.name.as_deref() else {
            return (None, FetchStatus::Error("direct fetch requires name".into()));
        };

        let gvk = Gvk::from_api_version_kind(api_version, kind);
        let gvr = Gvr::new(gvk.group.clone(), gvk.version.clone(), kinds::naive_plural(kind));

        let namespace = if kinds::scope_for(&gvk.group, &gvk.kind).is_some() {
            None
        } else {
            req.namespace.as_deref()
        };

        let fetch = self.cluster.get(&gvr, kind, namespace, name);
        match tokio::time::timeout(per_request_timeout, fetch).await {
            Ok(Ok(Some(resource))) => (Some(resource), FetchStatus::Success),
            Ok(Ok(None)) => (None, FetchStatus::NotFound),
            Ok(Err(err)) => (None, FetchStatus::from_cluster_error(&err)),
            Err(_) => (None, FetchStatus::Timeout),
        }
    }
}

/// Whether a non-success status should fail the overall invocation for a
/// given request, per `optional` (spec §4.5's closing rule).
pub fn is_fatal(req: &ResourceRequest, status: &FetchStatus) -> bool {
    !status.is_success() && !req.optional
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use discovery_core::invocation::MatchType;
    use discovery_core::{CrdSummary, ListQuery};

    struct EmptyCluster;

    #[async_trait]
    impl ClusterReader for EmptyCluster {
        async fn get(&self, _: &Gvr, _: &str, _: Option<&str>, _: &str) -> Result<Option<Resource>, ClusterError> {
            Ok(None)
        }
        async fn list(&self, _: &Gvr, _: &str, _: Option<&str>, _: ListQuery) -> Result<Vec<Resource>, ClusterError> {
            Ok(vec![])
        }
        async fn list_crds(&self) -> Result<Vec<CrdSummary>, ClusterError> {
            Ok(vec![])
        }
    }

    fn base_req() -> ResourceRequest {
        ResourceRequest {
            into: "cluster".into(),
            match_type: MatchType::Direct,
            api_version: Some("kubecore.io/v1alpha1".into()),
            kind: Some("KubeCluster".into()),
            name: Some("demo".into()),
            namespace: Some("team-a".into()),
            optional: false,
            selector: Default::default(),
            namespace_selection: Default::default(),
            expressions: vec![],
            sort: vec![],
            constraints: Default::default(),
        }
    }

    #[tokio::test]
    async fn missing_resource_maps_to_not_found() {
        let resolver = DirectResolver::new(Arc::new(EmptyCluster));
        let (resource, status) = resolver.resolve(&base_req(), Duration::from_secs(1)).await;
        assert!(resource.is_none());
        assert_eq!(status, FetchStatus::NotFound);
    }

    #[test]
    fn not_found_is_fatal_unless_optional() {
        let mut req = base_req();
        assert!(is_fatal(&req, &FetchStatus::NotFound));
        req.optional = true;
        assert!(!is_fatal(&req, &FetchStatus::NotFound));
    }
}
