use crate::ids::Scope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a `ReferenceField` was recognised (spec §3/§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Exact known field name, or a recognised `...Ref(s)` suffix.
    Pattern,
    /// A `{name, [namespace], [kind/apiVersion]}`-shaped nested object.
    Structural,
    /// The field name merely embeds a known substring.
    Heuristic,
}

/// What kind of target a reference field is believed to point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    OwnerRef,
    ConfigMap,
    Secret,
    Service,
    Pvc,
    Custom,
}

/// A single detected reference field within a resource's schema (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceField {
    /// Dotted path within the resource, `[]` denotes array traversal
    /// (e.g. `spec.providerConfigRef`, `spec.resourceRefs[]`).
    pub path: String,
    pub target_kind: Option<String>,
    pub target_group: Option<String>,
    pub ref_type: RefType,
    /// In `[0, 1]`; a traversal-time floor rejects fields below threshold.
    pub confidence: f64,
    pub detection_method: DetectionMethod,
}

impl ReferenceField {
    pub fn new(
        path: impl Into<String>,
        ref_type: RefType,
        confidence: f64,
        detection_method: DetectionMethod,
    ) -> Self {
        Self {
            path: path.into(),
            target_kind: None,
            target_group: None,
            ref_type,
            confidence,
            detection_method,
        }
    }

    pub fn with_target(mut self, group: impl Into<String>, kind: impl Into<String>) -> Self {
        self.target_group = Some(group.into());
        self.target_kind = Some(kind.into());
        self
    }
}

/// Per-(group, version, kind) schema entry maintained by the Schema Registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub scope: Scope,
    /// Ordered; duplicates on the same path are collapsed to the
    /// highest-confidence entry by the Reference Detector before this is
    /// populated.
    pub reference_fields: Vec<ReferenceField>,
    pub required_fields: Vec<String>,
    pub open_api_schema: Option<Value>,
    /// The CRD's real `spec.names.plural`, when known from cluster
    /// enumeration (spec §3 GVR: "derived from ... the registry's plural
    /// mapping; cached once resolved"). `None` for embedded entries, which
    /// fall back to the naive pluraliser.
    pub plural: Option<String>,
}

impl SchemaDescriptor {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            reference_fields: Vec::new(),
            required_fields: Vec::new(),
            open_api_schema: None,
            plural: None,
        }
    }
}
