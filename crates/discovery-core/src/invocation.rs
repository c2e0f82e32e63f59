use crate::graph_model::{Cycle, ResourceEdge, ResourceNode};
use crate::resource::Resource;
use crate::status::{FetchStatus, TerminationReason};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ---------------------------------------------------------------------
// Invocation input (spec §6)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Direct,
    Label,
    Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpressionOperator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    Exists,
    NotExists,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldExpression {
    pub path: String,
    pub operator: ExpressionOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum LabelSelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelMatchExpression {
    pub key: String,
    pub operator: LabelSelectorOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorSpec {
    #[serde(default)]
    pub match_labels: HashMap<String, String>,
    #[serde(default)]
    pub match_expressions: Vec<LabelMatchExpression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    pub path: String,
    #[serde(default = "default_ascending")]
    pub direction: SortDirection,
}

fn default_ascending() -> SortDirection {
    SortDirection::Ascending
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSpec {
    pub min_matches: Option<usize>,
    pub max_matches: Option<usize>,
    #[serde(default)]
    pub fail_on_constraint_violation: bool,
    #[serde(default)]
    pub stop_on_first: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSelection {
    /// Explicit namespace list.
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Scan every namespace this invocation is permitted to list.
    #[serde(default)]
    pub cross_namespace: bool,
    #[serde(default)]
    pub allowed_namespaces: Vec<String>,
}

/// One entry of `fetchResources` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    /// Matches `[a-zA-Z][a-zA-Z0-9_]*`; the key under which the result lands
    /// in `resources`/`multiResources`.
    pub into: String,
    pub match_type: MatchType,
    pub api_version: Option<String>,
    pub kind: Option<String>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub optional: bool,

    // matchType: label
    #[serde(default)]
    pub selector: LabelSelectorSpec,
    #[serde(default)]
    pub namespace_selection: NamespaceSelection,

    // matchType: expression
    #[serde(default)]
    pub expressions: Vec<FieldExpression>,

    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub constraints: ConstraintSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    Forward,
    Reverse,
    Bidirectional,
}

impl Default for TraversalDirection {
    fn default() -> Self {
        TraversalDirection::Forward
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    Continue,
    Stop,
    Fail,
}

impl Default for CyclePolicy {
    fn default() -> Self {
        CyclePolicy::Continue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategy {
    Lru,
    Lfu,
    Ttl,
}

impl Default for EvictionStrategy {
    fn default() -> Self {
        EvictionStrategy::Lru
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_resources")]
    pub max_resources: usize,
    #[serde(with = "humantime_serde", default = "default_traversal_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub direction: TraversalDirection,
    #[serde(default)]
    pub on_cycle_detected: CyclePolicy,
    #[serde(default = "default_true")]
    pub cycle_detection_enabled: bool,
    #[serde(default = "default_max_cycles")]
    pub max_cycles: usize,
    #[serde(default = "default_true")]
    pub skip_missing_references: bool,
    #[serde(default = "default_true")]
    pub follow_owner_references: bool,
    /// See DESIGN.md "Open Question decisions": spec §9 leaves the
    /// effective confidence floor ambiguous between 0.5 (traversal) and 0.7
    /// (scope filtering); this implementation applies 0.5 here and 0.7 in
    /// the scope filter, as two distinct, independently documented floors.
    #[serde(default = "default_min_confidence")]
    pub min_confidence_threshold: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub same_depth_batching: bool,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
    #[serde(with = "humantime_serde", default = "default_batch_timeout")]
    pub batch_timeout: Duration,
    #[serde(default)]
    pub cache_strategy: EvictionStrategy,
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size_bytes: usize,
    #[serde(default = "default_max_graph_size")]
    pub max_graph_size_bytes: usize,
    #[serde(default = "default_gc_threshold")]
    pub gc_threshold_bytes: usize,
}

fn default_max_depth() -> usize {
    3
}
fn default_max_resources() -> usize {
    500
}
fn default_traversal_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_true() -> bool {
    true
}
fn default_max_cycles() -> usize {
    50
}
fn default_min_confidence() -> f64 {
    0.5
}
fn default_batch_size() -> usize {
    25
}
fn default_max_concurrent_requests() -> usize {
    10
}
fn default_max_concurrent_batches() -> usize {
    4
}
fn default_batch_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_max_cache_size() -> usize {
    64 * 1024 * 1024
}
fn default_max_graph_size() -> usize {
    128 * 1024 * 1024
}
fn default_gc_threshold() -> usize {
    48 * 1024 * 1024
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_depth: default_max_depth(),
            max_resources: default_max_resources(),
            timeout: default_traversal_timeout(),
            direction: TraversalDirection::default(),
            on_cycle_detected: CyclePolicy::default(),
            cycle_detection_enabled: true,
            max_cycles: default_max_cycles(),
            skip_missing_references: true,
            follow_owner_references: true,
            min_confidence_threshold: default_min_confidence(),
            batch_size: default_batch_size(),
            same_depth_batching: true,
            max_concurrent_requests: default_max_concurrent_requests(),
            max_concurrent_batches: default_max_concurrent_batches(),
            batch_timeout: default_batch_timeout(),
            cache_strategy: EvictionStrategy::default(),
            max_cache_size_bytes: default_max_cache_size(),
            max_graph_size_bytes: default_max_graph_size(),
            gc_threshold_bytes: default_gc_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Merge,
    Replace,
    FailOnConflict,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::Merge
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamespaceStrategy {
    XrNamespace,
    FunctionNamespace,
    Auto,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDetection {
    #[serde(default)]
    pub enabled: bool,
    pub strategy: NamespaceStrategy,
    pub fallback_strategy: Option<NamespaceStrategy>,
    pub default_namespace: Option<String>,
    #[serde(default = "default_namespace_label_key")]
    pub label_key: String,
}

fn default_namespace_label_key() -> String {
    "kubecore.io/namespace".to_string()
}

impl Default for NamespaceDetection {
    fn default() -> Self {
        Self {
            enabled: false,
            strategy: NamespaceStrategy::Auto,
            fallback_strategy: None,
            default_namespace: None,
            label_key: default_namespace_label_key(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelValueSource {
    XrField,
    Env,
    Timestamp,
    Uuid,
    Constant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ValueTransform {
    Lowercase,
    Uppercase,
    Prefix { value: String },
    Suffix { value: String },
    Replace { old: String, new: String },
    Truncate { len: usize },
    Hash { alg: HashAlg, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlg {
    Md5,
    Sha1,
    Sha256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicLabelEntry {
    pub key: String,
    pub source: LabelValueSource,
    pub path: Option<String>,
    pub env_var: Option<String>,
    pub constant: Option<String>,
    #[serde(default)]
    pub transform: Vec<ValueTransform>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub static_labels: HashMap<String, String>,
    #[serde(default)]
    pub dynamic: Vec<DynamicLabelEntry>,
    #[serde(default)]
    pub namespace_detection: NamespaceDetection,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default)]
    pub enforce_labels: Vec<String>,
}

/// Allow/deny configuration for the Scope Filter (spec §4.7). Not named in
/// spec §6's input-record excerpt but required by §4.7/§8's "scope closure"
/// property; carried on `Request` alongside `traversalConfig`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFilterConfig {
    #[serde(default)]
    pub platform_only: bool,
    #[serde(default)]
    pub include_api_groups: Vec<String>,
    #[serde(default)]
    pub exclude_api_groups: Vec<String>,
    #[serde(default)]
    pub allowed_kinds: Vec<String>,
    #[serde(default)]
    pub denied_kinds: Vec<String>,
    #[serde(default)]
    pub allowed_namespaces: Vec<String>,
    #[serde(default)]
    pub denied_namespaces: Vec<String>,
    #[serde(default)]
    pub cross_namespace_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// The root composite resource. Named explicitly here since spec §6's
    /// input-record excerpt focuses on `fetchResources`/`traversalConfig`/
    /// `xrLabels`; see DESIGN.md's Open Question decisions for why `root`
    /// is this implementation's chosen field name.
    pub root: Resource,
    /// The namespace the composition function process itself runs in,
    /// used by `function-namespace` namespace-detection strategy and as a
    /// Phase-2 fallback target namespace.
    pub function_namespace: String,
    #[serde(default)]
    pub fetch_resources: Vec<ResourceRequest>,
    #[serde(default)]
    pub traversal_config: TraversalConfig,
    #[serde(default)]
    pub xr_labels: LabelConfig,
    #[serde(default)]
    pub scope_filter: ScopeFilterConfig,
    #[serde(default)]
    pub phase2_features: bool,
    #[serde(with = "humantime_serde", default = "default_fetch_timeout")]
    pub fetch_timeout: Duration,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_max_concurrent_fetches() -> usize {
    10
}

// ---------------------------------------------------------------------
// Invocation output (spec §6)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub status: FetchStatus,
    pub resource: Option<Resource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseCounters {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timeout_count: usize,
    pub schema_parse_failures: usize,
    pub per_phase: PerPhaseSummary,
    pub elapsed_ms: u64,
    pub cache_hit_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerPhaseSummary {
    pub phase1: PhaseCounters,
    pub phase2: PhaseCounters,
    pub phase3: PhaseCounters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryGraphOutput {
    pub nodes: Vec<ResourceNode>,
    pub edges: Vec<ResourceEdge>,
    pub cycles: Vec<Cycle>,
    pub termination_reason: TerminationReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationWarning {
    pub into: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub resources: HashMap<String, FetchResult>,
    pub multi_resources: HashMap<String, Vec<Resource>>,
    pub summary: Summary,
    pub graph: Option<DiscoveryGraphOutput>,
    pub mutated_root: Resource,
    #[serde(default)]
    pub warnings: Vec<InvocationWarning>,
}

/// Minimal `serde_with`-style humantime (de)serialization for `Duration`
/// fields, following the same "durations are human strings on the wire"
/// convention spec §6 uses (`fetchTimeout: duration # default 5s`).
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        humantime::format_duration(*d).to_string().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(d)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_config_defaults_match_spec() {
        let c = TraversalConfig::default();
        assert!(!c.enabled);
        assert_eq!(c.max_depth, 3);
        assert_eq!(c.min_confidence_threshold, 0.5);
    }

    #[test]
    fn resource_request_deserializes_from_camel_case_json() {
        let json = serde_json::json!({
            "into": "cluster",
            "matchType": "direct",
            "kind": "KubeCluster",
            "name": "demo-cluster",
            "namespace": "test"
        });
        let req: ResourceRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.into, "cluster");
        assert_eq!(req.match_type, MatchType::Direct);
    }
}
