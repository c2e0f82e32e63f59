//! C1 — Reference Detector (spec §4.1).
//!
//! Walks an OpenAPI v3-shaped schema fragment (represented generically as
//! `serde_json::Value`, the way both the embedded table and the CRD-parsed
//! dynamic schemas present it) and decides which properties look like
//! cross-resource references.

use discovery_core::{DetectionMethod, DiscoveryError, ReferenceField, RefType};
use serde_json::Value;
use std::collections::HashMap;

/// Exact field names whose target is unambiguous (spec §4.1 "Exact known
/// name"). Maps field name -> (target group, target kind, ref type).
const EXACT_NAMES: &[(&str, &str, &str)] = &[
    ("providerConfigRef", "kubecore.io", "ProviderConfig"),
    ("compositionRef", "apiextensions.crossplane.io", "Composition"),
    ("resourceRef", "", ""),
];

/// Known stems for the `...Ref|Refs|Reference|References` suffix rule and
/// the heuristic substring rule share this table (spec §4.1).
const KNOWN_STEMS: &[(&str, &str, &str, f64)] = &[
    ("secret", "", "Secret", 0.95),
    ("configMap", "", "ConfigMap", 0.95),
    ("service", "", "Service", 0.85),
    ("pvc", "", "PersistentVolumeClaim", 0.85),
    ("persistentVolumeClaim", "", "PersistentVolumeClaim", 0.9),
    ("providerConfig", "kubecore.io", "ProviderConfig", 0.9),
    ("composition", "apiextensions.crossplane.io", "Composition", 0.85),
];

fn ref_type_for_stem(stem_lower: &str) -> RefType {
    match stem_lower {
        "secret" => RefType::Secret,
        "configmap" => RefType::ConfigMap,
        "service" => RefType::Service,
        "pvc" | "persistentvolumeclaim" => RefType::Pvc,
        _ => RefType::Custom,
    }
}

pub struct ReferenceDetector;

impl ReferenceDetector {
    /// `Detect(schema)` — spec §4.1.
    pub fn detect(schema: &Value) -> Result<Vec<ReferenceField>, DiscoveryError> {
        let root = schema
            .as_object()
            .ok_or_else(|| DiscoveryError::InvalidSchema("schema root is not an object".into()))?;

        let mut by_path: HashMap<String, ReferenceField> = HashMap::new();
        if let Some(Value::Object(props)) = root.get("properties") {
            for (name, prop_schema) in props {
                if name == "status" {
                    // Status-subtree fields are excluded to avoid status echo
                    // pollution (spec §4.1).
                    continue;
                }
                walk_property(name, name, prop_schema, &mut by_path);
            }
        }

        let mut fields: Vec<ReferenceField> = by_path.into_values().collect();
        fields.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(fields)
    }
}

fn walk_property(path: &str, field_name: &str, prop: &Value, out: &mut HashMap<String, ReferenceField>) {
    let Some(obj) = prop.as_object() else {
        return;
    };
    let empty_map = serde_json::Map::new();

    // Arrays are classified (and recursed into) only under their `[]`
    // path — the bare field name never gets its own entry alongside it.
    if obj.get("type").and_then(Value::as_str) == Some("array") {
        let Some(items) = obj.get("items") else {
            return;
        };
        let array_path = format!("{path}[]");
        let items_obj = items.as_object().unwrap_or(&empty_map);
        if let Some(candidate) = classify_field(field_name, items_obj) {
            insert_best(out, array_path.clone(), candidate);
        }
        if let Some(Value::Object(nested)) = items_obj.get("properties") {
            for (nested_name, nested_schema) in nested {
                if nested_name == "status" {
                    continue;
                }
                let nested_path = format!("{array_path}.{nested_name}");
                walk_property(&nested_path, nested_name, nested_schema, out);
            }
        }
        return;
    }

    if let Some(candidate) = classify_field(field_name, obj) {
        insert_best(out, path.to_string(), candidate);
    }

    if obj.get("type").and_then(Value::as_str) == Some("object") {
        if let Some(Value::Object(nested)) = obj.get("properties") {
            for (nested_name, nested_schema) in nested {
                if nested_name == "status" {
                    continue;
                }
                let nested_path = format!("{path}.{nested_name}");
                walk_property(&nested_path, nested_name, nested_schema, out);
            }
        }
    }
}

fn insert_best(out: &mut HashMap<String, ReferenceField>, path: String, candidate: ReferenceField) {
    match out.get(&path) {
        Some(existing) if existing.confidence >= candidate.confidence => {}
        _ => {
            out.insert(path, candidate);
        }
    }
}

fn classify_field(name: &str, schema: &serde_json::Map<String, Value>) -> Option<ReferenceField> {
    // Rule 1: exact known name.
    if let Some((_, group, kind)) = EXACT_NAMES.iter().find(|(n, ..)| *n == name) {
        let mut field = ReferenceField::new(name, RefType::Custom, 1.0, DetectionMethod::Pattern);
        if !kind.is_empty() {
            field = field.with_target(*group, *kind);
        }
        return Some(field);
    }

    // Rule 2: suffix match against Ref|Refs|Reference|References.
    if let Some(stem) = strip_reference_suffix(name) {
        let stem_lower = stem.to_ascii_lowercase();
        if let Some((_, group, kind, confidence)) = KNOWN_STEMS
            .iter()
            .find(|(known_stem, ..)| stem_lower.contains(&known_stem.to_ascii_lowercase()))
        {
            let ref_type = ref_type_for_stem(&stem_lower);
            let field = ReferenceField::new(name, ref_type, *confidence, DetectionMethod::Pattern)
                .with_target(*group, *kind);
            return Some(field);
        }
        // A `...Ref` suffix with an unrecognised stem: still a reference,
        // just with no inferable target kind, so it sits below the
        // empty-targetKind confidence floor (spec §3) and `apply_confidence_floor`
        // drops it unless a later rule upgrades the same path to a real target.
        let field = ReferenceField::new(name, RefType::Custom, 0.65, DetectionMethod::Pattern);
        return Some(field);
    }

    // Rule 3: nested-object shape {name, [namespace], [kind/apiVersion]}.
    if is_structural_reference_shape(schema) {
        return Some(ReferenceField::new(
            name,
            RefType::Custom,
            0.7,
            DetectionMethod::Structural,
        ));
    }

    // Rule 4: heuristic substring match.
    let name_lower = name.to_ascii_lowercase();
    if let Some((_, group, kind, _)) = KNOWN_STEMS
        .iter()
        .find(|(stem, ..)| name_lower.contains(&stem.to_ascii_lowercase()))
    {
        let ref_type = ref_type_for_stem(&name_lower);
        let field = ReferenceField::new(name, ref_type, 0.6, DetectionMethod::Heuristic)
            .with_target(*group, *kind);
        return Some(field);
    }

    None
}

fn strip_reference_suffix(name: &str) -> Option<&str> {
    for suffix in ["References", "Reference", "Refs", "Ref"] {
        if let Some(stem) = name.strip_suffix(suffix) {
            if !stem.is_empty() {
                return Some(stem);
            }
        }
    }
    None
}

fn is_structural_reference_shape(schema: &serde_json::Map<String, Value>) -> bool {
    let Some(Value::Object(props)) = schema.get("properties") else {
        return false;
    };
    if !props.contains_key("name") {
        return false;
    }
    let plausible_extra_keys = ["namespace", "kind", "apiVersion"];
    props.keys().all(|k| k == "name" || plausible_extra_keys.contains(&k.as_str()))
}

/// Candidates with empty `targetKind` and confidence < 0.7 are discarded
/// (spec §3). Applied by callers (the Schema Registry) after `detect()`
/// returns, so `detect()` itself stays a pure schema walk.
pub fn apply_confidence_floor(fields: Vec<ReferenceField>) -> Vec<ReferenceField> {
    fields
        .into_iter()
        .filter(|f| !(f.target_kind.is_none() && f.confidence < 0.7))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_object_root() {
        let err = ReferenceDetector::detect(&json!("not-an-object")).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidSchema(_)));
    }

    #[test]
    fn exact_name_gets_full_confidence() {
        let schema = json!({
            "type": "object",
            "properties": {
                "providerConfigRef": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        });
        let fields = ReferenceDetector::detect(&schema).unwrap();
        let f = fields.iter().find(|f| f.path == "providerConfigRef").unwrap();
        assert_eq!(f.confidence, 1.0);
        assert_eq!(f.target_kind.as_deref(), Some("ProviderConfig"));
    }

    #[test]
    fn suffix_rule_infers_secret() {
        let schema = json!({
            "type": "object",
            "properties": {
                "credentialsSecretRef": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        });
        let fields = ReferenceDetector::detect(&schema).unwrap();
        let f = fields.iter().find(|f| f.path == "credentialsSecretRef").unwrap();
        assert_eq!(f.target_kind.as_deref(), Some("Secret"));
        assert!(f.confidence >= 0.8 && f.confidence <= 0.95);
    }

    #[test]
    fn structural_shape_detected_without_ref_suffix() {
        let schema = json!({
            "type": "object",
            "properties": {
                "targetObject": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "namespace": {"type": "string"},
                        "kind": {"type": "string"}
                    }
                }
            }
        });
        let fields = ReferenceDetector::detect(&schema).unwrap();
        let f = fields.iter().find(|f| f.path == "targetObject").unwrap();
        assert_eq!(f.detection_method, DetectionMethod::Structural);
        assert_eq!(f.confidence, 0.7);
    }

    #[test]
    fn status_subtree_is_excluded() {
        let schema = json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "object",
                    "properties": {
                        "secretRef": {"type": "object", "properties": {"name": {"type": "string"}}}
                    }
                }
            }
        });
        let fields = ReferenceDetector::detect(&schema).unwrap();
        assert!(fields.is_empty());
    }

    #[test]
    fn confidence_floor_drops_unknown_stem_refs() {
        let schema = json!({
            "type": "object",
            "properties": {
                "fooRef": {"type": "object", "properties": {"id": {"type": "string"}}}
            }
        });
        let fields = ReferenceDetector::detect(&schema).unwrap();
        let filtered = apply_confidence_floor(fields);
        assert!(filtered.is_empty());
    }

    #[test]
    fn array_of_refs_path_uses_bracket_suffix() {
        let schema = json!({
            "type": "object",
            "properties": {
                "resourceRefs": {
                    "type": "array",
                    "items": {"type": "object", "properties": {"name": {"type": "string"}}}
                }
            }
        });
        let fields = ReferenceDetector::detect(&schema).unwrap();
        assert!(fields.iter().any(|f| f.path == "resourceRefs[]"));
    }
}
