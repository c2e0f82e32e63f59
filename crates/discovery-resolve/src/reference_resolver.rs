//! C8 — Reference Resolver (spec §4.8): `Outgoing(parent) -> []PendingFetch`.

use crate::kinds;
use discovery_core::schema::{RefType, ReferenceField};
use discovery_core::{Gvk, Resource, Scope};
use serde_json::Value;

/// One candidate edge the traversal engine may choose to fetch, with enough
/// identity to resolve a GVR and enough provenance (`confidence`, `field`)
/// to explain or drop it later.
#[derive(Debug, Clone)]
pub struct PendingFetch {
    pub gvk: Gvk,
    pub name: String,
    pub namespace: Option<String>,
    pub field_path: String,
    pub confidence: f64,
    pub ref_type: RefType,
    /// True when `gvk` came from `infer_gvk`'s last-ditch guess (no known
    /// target kind at all) rather than an explicit or schema-resolved one —
    /// a `NotFound` against this gvk means the guess was likely wrong, not
    /// that the object is missing, so callers should surface it as
    /// `SchemaUnavailable` (spec §9).
    pub best_effort_gvk: bool,
}

pub struct ReferenceResolver;

impl ReferenceResolver {
    /// `Outgoing(parent)`. `reference_fields` comes from the Schema Registry
    /// (C2) for `parent`'s gvk; `follow_owner_references` mirrors
    /// `TraversalConfig::follow_owner_references`.
    pub fn outgoing(parent: &Resource, reference_fields: &[ReferenceField], follow_owner_references: bool) -> Vec<PendingFetch> {
        let mut out = Vec::new();
        let full = parent.full_value();

        for field in reference_fields {
            out.extend(resolve_reference_field(parent, &full, field));
        }

        if follow_owner_references {
            for owner in parent.owner_references() {
                out.push(PendingFetch {
                    gvk: Gvk::from_api_version_kind(&owner.api_version, owner.kind.clone()),
                    name: owner.name.clone(),
                    namespace: parent.namespace().map(str::to_string),
                    field_path: "metadata.ownerReferences[]".to_string(),
                    confidence: 1.0,
                    ref_type: RefType::OwnerRef,
                    best_effort_gvk: false,
                });
            }
        }

        out
    }
}

fn resolve_reference_field(parent: &Resource, full: &Value, field: &ReferenceField) -> Vec<PendingFetch> {
    let is_array = field.path.ends_with("[]");
    let base_path = field.path.trim_end_matches("[]");

    if is_array {
        // The detector's `[]` convention means the schema path names the
        // array; re-resolve each element's `name`/`namespace` individually.
        let Ok(len) = count_array(full, base_path) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for i in 0..len {
            let indexed_path = format!("{base_path}[{i}]");
            if let Some(fetch) = resolve_single(parent, full, field, &indexed_path) {
                out.push(fetch);
            }
        }
        out
    } else {
        resolve_single(parent, full, field, base_path).into_iter().collect()
    }
}

fn count_array(full: &Value, path: &str) -> Result<usize, ()> {
    let mut current = full;
    for segment in path.split('.') {
        current = current.as_object().and_then(|m| m.get(segment)).ok_or(())?;
    }
    current.as_array().map(|a| a.len()).ok_or(())
}

fn resolve_single(parent: &Resource, full: &Value, field: &ReferenceField, object_path: &str) -> Option<PendingFetch> {
    let object = discovery_labels::extract_object(full, object_path)?;
    let name = object.get("name")?.as_str()?.to_string();

    let explicit_kind = object.get("kind").and_then(Value::as_str);
    let explicit_api_version = object.get("apiVersion").and_then(Value::as_str);

    let (gvk, best_effort_gvk) = match (explicit_api_version, explicit_kind) {
        (Some(av), Some(k)) => (Gvk::from_api_version_kind(av, k), false),
        _ => infer_gvk(parent, field),
    };

    let namespace = object
        .get("namespace")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| parent.namespace().map(str::to_string));

    let namespace = if kinds::scope_for(&gvk.group, &gvk.kind).is_some() {
        None
    } else if matches!(parent.scope, Scope::ClusterScoped) && namespace.is_none() {
        None
    } else {
        namespace
    };

    Some(PendingFetch {
        gvk,
        name,
        namespace,
        field_path: object_path.to_string(),
        confidence: field.confidence,
        ref_type: field.ref_type.clone(),
        best_effort_gvk,
    })
}

/// When a reference object omits `kind`/`apiVersion`: infer from the known
/// target on the `ReferenceField` (C1's stem table already resolved this),
/// then from fixed core-kind versions, else inherit the parent's group with
/// `v1alpha1` as a last-ditch guess (spec §4.8). The `bool` is true only for
/// that last-ditch case, where the target kind itself is unknown.
fn infer_gvk(parent: &Resource, field: &ReferenceField) -> (Gvk, bool) {
    if let (Some(group), Some(kind)) = (&field.target_group, &field.target_kind) {
        if let Some(core_version) = kinds::core_api_version(kind) {
            return (Gvk::new(group.clone(), core_version, kind.clone()), false);
        }
        let version = match field.ref_type {
            RefType::Secret | RefType::ConfigMap | RefType::Service | RefType::Pvc => "v1".to_string(),
            _ => "v1alpha1".to_string(),
        };
        return (Gvk::new(group.clone(), version, kind.clone()), false);
    }

    if let Some(kind) = &field.target_kind {
        if let Some(core_version) = kinds::core_api_version(kind) {
            return (Gvk::new("", core_version, kind.clone()), false);
        }
        return (Gvk::new(parent.gvk.group.clone(), "v1alpha1", kind.clone()), false);
    }

    (Gvk::new(parent.gvk.group.clone(), "v1alpha1", "Unknown"), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::schema::DetectionMethod;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::api::DynamicObject;

    fn parent_with_data(data: serde_json::Value) -> Resource {
        let dynamic = DynamicObject {
            types: None,
            metadata: ObjectMeta { name: Some("demo".into()), namespace: Some("team-a".into()), ..Default::default() },
            data,
        };
        Resource::from_dynamic(Gvk::new("kubecore.io", "v1alpha1", "KubeCluster"), Scope::Namespaced, dynamic)
    }

    #[test]
    fn resolves_single_reference_with_explicit_kind() {
        let parent = parent_with_data(serde_json::json!({
            "spec": {"providerConfigRef": {"name": "aws", "kind": "ProviderConfig", "apiVersion": "kubecore.io/v1alpha1"}}
        }));
        let field = ReferenceField::new("spec.providerConfigRef", RefType::Custom, 1.0, DetectionMethod::Pattern)
            .with_target("kubecore.io", "ProviderConfig");
        let fetches = ReferenceResolver::outgoing(&parent, &[field], false);
        assert_eq!(fetches.len(), 1);
        assert_eq!(fetches[0].name, "aws");
        assert_eq!(fetches[0].gvk.kind, "ProviderConfig");
    }

    #[test]
    fn resolves_array_of_references() {
        let parent = parent_with_data(serde_json::json!({
            "spec": {"resourceRefs": [{"name": "a"}, {"name": "b"}]}
        }));
        let field = ReferenceField::new("spec.resourceRefs[]", RefType::Custom, 0.8, DetectionMethod::Pattern);
        let fetches = ReferenceResolver::outgoing(&parent, &[field], false);
        assert_eq!(fetches.len(), 2);
    }

    #[test]
    fn secret_reference_without_apiversion_uses_core_v1() {
        let parent = parent_with_data(serde_json::json!({
            "spec": {"credentialsSecretRef": {"name": "creds"}}
        }));
        let field = ReferenceField::new("spec.credentialsSecretRef", RefType::Secret, 0.95, DetectionMethod::Pattern)
            .with_target("", "Secret");
        let fetches = ReferenceResolver::outgoing(&parent, &[field], false);
        assert_eq!(fetches[0].gvk.version, "v1");
    }
}
