//! End-to-end scenarios run through the public `discover()` entry point
//! against an in-memory `ClusterReader` (the "FakeCluster" spec §8's
//! cluster-call boundary is designed around).

use async_trait::async_trait;
use discovery_core::invocation::{
    ConstraintSpec, LabelSelectorSpec, MatchType, Request, ResourceRequest, TraversalConfig,
};
use discovery_core::{ClusterError, ClusterReader, CrdSummary, DiscoveryError, Gvk, Gvr, ListQuery, Resource, Scope, TerminationReason};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use std::collections::BTreeMap;
use std::sync::Arc;

struct FakeCluster {
    resources: Vec<Resource>,
    crds: Vec<CrdSummary>,
}

impl FakeCluster {
    fn new(resources: Vec<Resource>) -> Self {
        Self { resources, crds: Vec::new() }
    }

    fn with_crds(resources: Vec<Resource>, crds: Vec<CrdSummary>) -> Self {
        Self { resources, crds }
    }
}

#[async_trait]
impl ClusterReader for FakeCluster {
    async fn get(&self, gvr: &Gvr, _kind: &str, namespace: Option<&str>, name: &str) -> Result<Option<Resource>, ClusterError> {
        Ok(self
            .resources
            .iter()
            .find(|r| {
                r.gvk.group == gvr.group
                    && discovery_resolve::kinds::naive_plural(&r.gvk.kind) == gvr.resource
                    && r.name() == name
                    && r.namespace() == namespace
            })
            .cloned())
    }

    async fn list(&self, gvr: &Gvr, _kind: &str, namespace: Option<&str>, query: ListQuery) -> Result<Vec<Resource>, ClusterError> {
        let wanted = parse_equality_selector(query.label_selector.as_deref());
        let mut matches: Vec<Resource> = self
            .resources
            .iter()
            .filter(|r| {
                r.gvk.group == gvr.group
                    && discovery_resolve::kinds::naive_plural(&r.gvk.kind) == gvr.resource
                    && r.namespace() == namespace
                    && wanted.iter().all(|(k, v)| r.labels().get(k) == Some(v))
            })
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            matches.truncate(limit as usize);
        }
        Ok(matches)
    }

    async fn list_crds(&self) -> Result<Vec<CrdSummary>, ClusterError> {
        Ok(self.crds.clone())
    }
}

/// `query.label_selector` is built by `compile_label_selector` as
/// comma-joined `key=value` (and `in (...)`/`!key`) clauses; tests only ever
/// exercise the equality form.
fn parse_equality_selector(selector: Option<&str>) -> Vec<(String, String)> {
    let Some(selector) = selector else { return Vec::new() };
    selector
        .split(',')
        .filter_map(|clause| clause.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn resource(gvk: Gvk, scope: Scope, name: &str, namespace: Option<&str>, uid: &str, labels: BTreeMap<String, String>, data: serde_json::Value) -> Resource {
    let dynamic = DynamicObject {
        types: None,
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.map(str::to_string),
            uid: Some(uid.to_string()),
            labels: (!labels.is_empty()).then_some(labels),
            ..Default::default()
        },
        data,
    };
    Resource::from_dynamic(gvk, scope, dynamic)
}

fn root_resource() -> Resource {
    resource(
        Gvk::new("kubecore.io", "v1alpha1", "KubeCluster"),
        Scope::Namespaced,
        "demo-root",
        Some("test"),
        "root-uid",
        BTreeMap::new(),
        serde_json::json!({}),
    )
}

fn base_request() -> Request {
    Request {
        root: root_resource(),
        function_namespace: "test".to_string(),
        fetch_resources: Vec::new(),
        traversal_config: TraversalConfig { enabled: false, ..Default::default() },
        xr_labels: Default::default(),
        scope_filter: Default::default(),
        phase2_features: false,
        fetch_timeout: std::time::Duration::from_secs(5),
        max_concurrent_fetches: 10,
    }
}

fn direct_request(into: &str, kind: &str, name: &str, namespace: &str, optional: bool) -> ResourceRequest {
    ResourceRequest {
        into: into.to_string(),
        match_type: MatchType::Direct,
        api_version: Some("kubecore.io/v1alpha1".to_string()),
        kind: Some(kind.to_string()),
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        optional,
        selector: Default::default(),
        namespace_selection: Default::default(),
        expressions: vec![],
        sort: vec![],
        constraints: Default::default(),
    }
}

#[tokio::test]
async fn s1_direct_fetch_two_references() {
    let cluster_resources = vec![
        resource(Gvk::new("kubecore.io", "v1alpha1", "KubeCluster"), Scope::Namespaced, "demo-cluster", Some("test"), "cluster-uid", BTreeMap::new(), serde_json::json!({})),
        resource(Gvk::new("kubecore.io", "v1alpha1", "GitHubProject"), Scope::Namespaced, "demo-project", Some("test"), "project-uid", BTreeMap::new(), serde_json::json!({})),
    ];
    let cluster: Arc<dyn ClusterReader> = Arc::new(FakeCluster::new(cluster_resources));

    let mut request = base_request();
    request.fetch_resources = vec![
        direct_request("cluster", "KubeCluster", "demo-cluster", "test", false),
        direct_request("project", "GitHubProject", "demo-project", "test", false),
    ];

    let response = discovery_engine::discover(request, cluster).await.unwrap();

    assert_eq!(response.summary.successful, 2);
    assert_eq!(response.summary.failed, 0);
    assert!(response.resources["cluster"].resource.is_some());
    assert!(response.resources["project"].resource.is_some());
}

#[tokio::test]
async fn s2_partial_failure_is_not_terminal() {
    let cluster_resources = vec![resource(
        Gvk::new("kubecore.io", "v1alpha1", "KubeCluster"),
        Scope::Namespaced,
        "demo-cluster",
        Some("test"),
        "cluster-uid",
        BTreeMap::new(),
        serde_json::json!({}),
    )];
    let cluster: Arc<dyn ClusterReader> = Arc::new(FakeCluster::new(cluster_resources));

    let mut request = base_request();
    request.fetch_resources = vec![
        direct_request("cluster", "KubeCluster", "demo-cluster", "test", false),
        direct_request("project", "GitHubProject", "demo-project", "test", false),
    ];

    let response = discovery_engine::discover(request, cluster).await.unwrap();

    assert_eq!(response.summary.successful, 1);
    assert_eq!(response.summary.failed, 1);
    assert_eq!(response.resources["project"].status, discovery_core::FetchStatus::NotFound);
    assert!(response.resources["project"].resource.is_none());
}

#[tokio::test]
async fn s3_label_selector_constraint_violation_is_terminal() {
    let labels = |v: &str| BTreeMap::from([("env".to_string(), v.to_string())]);
    let cluster_resources = vec![
        resource(Gvk::new("kubecore.io", "v1alpha1", "KubeCluster"), Scope::Namespaced, "a", Some("test"), "a-uid", labels("production"), serde_json::json!({})),
        resource(Gvk::new("kubecore.io", "v1alpha1", "KubeCluster"), Scope::Namespaced, "b", Some("test"), "b-uid", labels("production"), serde_json::json!({})),
    ];
    let cluster: Arc<dyn ClusterReader> = Arc::new(FakeCluster::new(cluster_resources));

    let mut request = base_request();
    request.fetch_resources = vec![ResourceRequest {
        into: "clusters".to_string(),
        match_type: MatchType::Label,
        api_version: Some("kubecore.io/v1alpha1".to_string()),
        kind: Some("KubeCluster".to_string()),
        name: None,
        namespace: None,
        optional: false,
        selector: LabelSelectorSpec { match_labels: std::collections::HashMap::from([("env".to_string(), "production".to_string())]), match_expressions: vec![] },
        namespace_selection: Default::default(),
        expressions: vec![],
        sort: vec![],
        constraints: ConstraintSpec { min_matches: Some(5), max_matches: None, fail_on_constraint_violation: true, stop_on_first: false },
    }];

    let err = discovery_engine::discover(request, cluster).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::ConstraintViolation { found: 2, required: 5 }));
}

fn chain_crd() -> CrdSummary {
    CrdSummary {
        group: "chain.kubecore.io".to_string(),
        kind: "ChainLink".to_string(),
        plural: "chainlinks".to_string(),
        scope: Scope::Namespaced,
        versions: vec![(
            "v1alpha1".to_string(),
            Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "spec": {
                        "type": "object",
                        "properties": {
                            "next": {
                                "type": "object",
                                "properties": {
                                    "name": {"type": "string"},
                                    "namespace": {"type": "string"},
                                    "kind": {"type": "string"},
                                    "apiVersion": {"type": "string"}
                                }
                            }
                        }
                    }
                }
            })),
        )],
    }
}

fn chain_link(name: &str, uid: &str, next: Option<&str>) -> Resource {
    let data = match next {
        Some(next_name) => serde_json::json!({
            "spec": {
                "next": {
                    "name": next_name,
                    "namespace": "test",
                    "kind": "ChainLink",
                    "apiVersion": "chain.kubecore.io/v1alpha1"
                }
            }
        }),
        None => serde_json::json!({"spec": {}}),
    };
    resource(Gvk::new("chain.kubecore.io", "v1alpha1", "ChainLink"), Scope::Namespaced, name, Some("test"), uid, BTreeMap::new(), data)
}

#[tokio::test]
async fn s4_traversal_stops_at_depth_cap() {
    let cluster_resources = vec![
        chain_link("x", "x-uid", Some("y")),
        chain_link("y", "y-uid", Some("z")),
        chain_link("z", "z-uid", Some("w")),
        chain_link("w", "w-uid", None),
    ];
    let cluster: Arc<dyn ClusterReader> = Arc::new(FakeCluster::with_crds(cluster_resources, vec![chain_crd()]));

    let mut request = base_request();
    request.fetch_resources = vec![direct_request_generic("x", "chain.kubecore.io/v1alpha1", "ChainLink", "x", "test")];
    request.traversal_config = TraversalConfig { enabled: true, max_depth: 2, ..Default::default() };

    let response = discovery_engine::discover(request, cluster).await.unwrap();
    let graph = response.graph.expect("traversal enabled produces a graph");

    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.edges.len(), 2);
    assert_eq!(graph.termination_reason, TerminationReason::DepthLimit);
}

#[tokio::test]
async fn s5_cycle_with_continue_keeps_one_edge() {
    let a = chain_link("a", "a-uid", Some("b"));
    let b = chain_link("b", "b-uid", Some("a"));
    let cluster: Arc<dyn ClusterReader> = Arc::new(FakeCluster::with_crds(vec![a, b], vec![chain_crd()]));

    let mut request = base_request();
    request.fetch_resources = vec![direct_request_generic("a", "chain.kubecore.io/v1alpha1", "ChainLink", "a", "test")];
    request.traversal_config = TraversalConfig { enabled: true, max_depth: 5, ..Default::default() };

    let response = discovery_engine::discover(request, cluster).await.unwrap();
    let graph = response.graph.expect("traversal enabled produces a graph");

    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.cycles.len(), 1);
    assert_eq!(graph.cycles[0].nodes.len(), 2);
}

fn direct_request_generic(into: &str, api_version: &str, kind: &str, name: &str, namespace: &str) -> ResourceRequest {
    ResourceRequest {
        into: into.to_string(),
        match_type: MatchType::Direct,
        api_version: Some(api_version.to_string()),
        kind: Some(kind.to_string()),
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        optional: false,
        selector: Default::default(),
        namespace_selection: Default::default(),
        expressions: vec![],
        sort: vec![],
        constraints: Default::default(),
    }
}

#[tokio::test]
async fn s7_reverse_direction_discovers_referrers() {
    use discovery_core::invocation::TraversalDirection;

    // "b" holds a forward reference to "a" via the same `spec.next` shape the
    // chain CRD schema detects; starting traversal *from* "a" in reverse mode
    // should discover "b" as a back-reference (spec §4.12 reverse mode).
    let a = chain_link("a", "a-uid", None);
    let b = chain_link("b", "b-uid", Some("a"));
    let cluster: Arc<dyn ClusterReader> = Arc::new(FakeCluster::with_crds(vec![a, b], vec![chain_crd()]));

    let mut request = base_request();
    request.fetch_resources = vec![direct_request_generic("a", "chain.kubecore.io/v1alpha1", "ChainLink", "a", "test")];
    request.traversal_config = TraversalConfig {
        enabled: true,
        max_depth: 2,
        direction: TraversalDirection::Reverse,
        ..Default::default()
    };

    let response = discovery_engine::discover(request, cluster).await.unwrap();
    let graph = response.graph.expect("traversal enabled produces a graph");

    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].from, "b-uid");
    assert_eq!(graph.edges[0].to, "a-uid");
    assert_eq!(graph.termination_reason, TerminationReason::Completed);
}

#[tokio::test]
async fn s6_label_injection_end_to_end() {
    use discovery_core::invocation::{DynamicLabelEntry, LabelConfig, LabelValueSource, NamespaceDetection, NamespaceStrategy, ValueTransform};

    let cluster: Arc<dyn ClusterReader> = Arc::new(FakeCluster::new(Vec::new()));

    let mut request = base_request();
    request.root = resource(
        Gvk::new("kubecore.io", "v1alpha1", "KubeCluster"),
        Scope::Namespaced,
        "PROD-CLUSTER",
        Some("team-a"),
        "root-uid",
        BTreeMap::from([("existing".to_string(), "v1".to_string())]),
        serde_json::json!({}),
    );
    request.xr_labels = LabelConfig {
        enabled: true,
        static_labels: std::collections::HashMap::from([("env".to_string(), "prod".to_string())]),
        dynamic: vec![DynamicLabelEntry {
            key: "name-lc".to_string(),
            source: LabelValueSource::XrField,
            path: Some("metadata.name".to_string()),
            env_var: None,
            constant: None,
            transform: vec![ValueTransform::Lowercase],
            required: false,
        }],
        namespace_detection: NamespaceDetection {
            enabled: true,
            strategy: NamespaceStrategy::XrNamespace,
            fallback_strategy: None,
            default_namespace: None,
            label_key: "kubecore.io/namespace".to_string(),
        },
        ..Default::default()
    };

    let response = discovery_engine::discover(request, cluster).await.unwrap();
    let labels = response.mutated_root.labels();

    assert_eq!(labels.get("existing").map(String::as_str), Some("v1"));
    assert_eq!(labels.get("env").map(String::as_str), Some("prod"));
    assert_eq!(labels.get("name-lc").map(String::as_str), Some("prod-cluster"));
    assert_eq!(labels.get("kubecore.io/namespace").map(String::as_str), Some("team-a"));
}
