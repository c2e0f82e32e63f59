//! C4 — Label Injector (spec §4.4): rewrites the root resource's labels
//! before the rest of the invocation runs.

use crate::extractor::extract;
use crate::transform::{apply_transforms, validate_label_key, validate_label_value};
use chrono::Utc;
use discovery_core::invocation::{
    DynamicLabelEntry, LabelConfig, LabelValueSource, MergeStrategy, NamespaceDetection, NamespaceStrategy,
};
use discovery_core::{DiscoveryError, Resource};
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

/// Runs all four steps of the injector against `root`'s current labels and
/// returns the final map; `root` itself is not mutated here (the caller —
/// the orchestrator in `discovery-engine` — assigns the result back, keeping
/// "single-writer" ownership of the root explicit at the call site).
pub fn inject(
    root: &Resource,
    config: &LabelConfig,
    function_namespace: &str,
) -> Result<BTreeMap<String, String>, DiscoveryError> {
    if !config.enabled {
        return Ok(root.labels());
    }

    let mut computed: BTreeMap<String, String> = BTreeMap::new();

    // Step 1: static entries verbatim.
    for (key, value) in &config.static_labels {
        validate_label_key(key)?;
        validate_label_value(value)?;
        computed.insert(key.clone(), value.clone());
    }

    // Step 2: dynamic entries.
    for entry in &config.dynamic {
        match resolve_dynamic_entry(root, entry) {
            Ok(value) => {
                validate_label_key(&entry.key)?;
                computed.insert(entry.key.clone(), value);
            }
            Err(err) if entry.required => return Err(err),
            Err(err) => {
                warn!(key = %entry.key, error = %err, "dropping optional dynamic label entry");
            }
        }
    }

    // Step 3: namespace detection.
    if config.namespace_detection.enabled {
        if let Some(ns) = resolve_namespace(root, &config.namespace_detection, function_namespace) {
            validate_label_key(&config.namespace_detection.label_key)?;
            validate_label_value(&ns)?;
            computed.insert(config.namespace_detection.label_key.clone(), ns);
        }
    }

    // Step 4: merge with the existing map.
    merge(root.labels(), computed, config)
}

fn resolve_dynamic_entry(root: &Resource, entry: &DynamicLabelEntry) -> Result<String, DiscoveryError> {
    let raw = match entry.source {
        LabelValueSource::XrField => {
            let path = entry.path.as_deref().ok_or_else(|| {
                DiscoveryError::InvalidExpression(format!("dynamic label {:?} has source=field but no path", entry.key))
            })?;
            extract(&root.full_value(), path)?
        }
        LabelValueSource::Env => {
            let var = entry.env_var.as_deref().ok_or_else(|| {
                DiscoveryError::InvalidExpression(format!("dynamic label {:?} has source=env but no envVar", entry.key))
            })?;
            std::env::var(var)
                .map_err(|_| DiscoveryError::InvalidExpression(format!("env var {var:?} is not set")))?
        }
        LabelValueSource::Timestamp => Utc::now().to_rfc3339(),
        LabelValueSource::Uuid => Uuid::new_v4().to_string(),
        LabelValueSource::Constant => entry.constant.clone().ok_or_else(|| {
            DiscoveryError::InvalidExpression(format!("dynamic label {:?} has source=constant but no constant", entry.key))
        })?,
    };

    let transformed = apply_transforms(raw, &entry.transform)?;
    validate_label_value(&transformed)?;
    Ok(transformed)
}

fn resolve_namespace(root: &Resource, detection: &NamespaceDetection, function_namespace: &str) -> Option<String> {
    let try_strategy = |strategy: &NamespaceStrategy| -> Option<String> {
        match strategy {
            NamespaceStrategy::XrNamespace => root.namespace().map(str::to_string),
            NamespaceStrategy::FunctionNamespace => {
                if function_namespace.is_empty() {
                    None
                } else {
                    Some(function_namespace.to_string())
                }
            }
            NamespaceStrategy::Auto => root
                .namespace()
                .map(str::to_string)
                .filter(|s| !s.is_empty())
                .or_else(|| Some(function_namespace.to_string()).filter(|s| !s.is_empty())),
            NamespaceStrategy::Skip => None,
        }
    };

    try_strategy(&detection.strategy)
        .or_else(|| detection.fallback_strategy.as_ref().and_then(try_strategy))
        .or_else(|| detection.default_namespace.clone())
}

fn merge(
    existing: BTreeMap<String, String>,
    computed: BTreeMap<String, String>,
    config: &LabelConfig,
) -> Result<BTreeMap<String, String>, DiscoveryError> {
    match config.merge_strategy {
        MergeStrategy::Merge => {
            let mut out = existing.clone();
            for (key, value) in computed {
                if let Some(existing_value) = existing.get(&key) {
                    if existing_value != &value && config.enforce_labels.iter().any(|k| k == &key) {
                        return Err(DiscoveryError::InvalidExpression(format!(
                            "enforceLabels violation: key {key:?} would change from {existing_value:?} to {value:?}"
                        )));
                    }
                }
                out.insert(key, value);
            }
            Ok(out)
        }
        MergeStrategy::Replace => {
            for key in &config.enforce_labels {
                let existing_value = existing.get(key).ok_or_else(|| {
                    DiscoveryError::InvalidExpression(format!("enforceLabels violation: key {key:?} missing after replace"))
                })?;
                if computed.get(key) != Some(existing_value) {
                    return Err(DiscoveryError::InvalidExpression(format!(
                        "enforceLabels violation: key {key:?} must keep its existing value under replace"
                    )));
                }
            }
            Ok(computed)
        }
        MergeStrategy::FailOnConflict => {
            let mut out = existing.clone();
            for (key, value) in computed {
                if let Some(existing_value) = existing.get(&key) {
                    if existing_value != &value {
                        return Err(DiscoveryError::InvalidExpression(format!(
                            "fail-on-conflict: key {key:?} differs ({existing_value:?} vs {value:?})"
                        )));
                    }
                }
                out.insert(key, value);
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::invocation::{MergeStrategy, NamespaceDetection, NamespaceStrategy, ValueTransform};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::api::DynamicObject;
    use std::collections::HashMap;

    fn root_with(name: &str, namespace: &str, labels: &[(&str, &str)]) -> Resource {
        let meta = ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
            ..Default::default()
        };
        let dynamic = DynamicObject {
            types: None,
            metadata: meta,
            data: serde_json::json!({}),
        };
        let gvk = discovery_core::Gvk::new("kubecore.io", "v1alpha1", "KubeCluster");
        Resource::from_dynamic(gvk, discovery_core::Scope::Namespaced, dynamic)
    }

    #[test]
    fn disabled_config_is_a_no_op() {
        let root = root_with("demo", "team-a", &[("existing", "v1")]);
        let config = LabelConfig::default();
        let out = inject(&root, &config, "kube-system").unwrap();
        assert_eq!(out.get("existing").map(String::as_str), Some("v1"));
    }

    #[test]
    fn s6_label_injection_scenario() {
        let root = root_with("PROD-CLUSTER", "team-a", &[("existing", "v1")]);
        let config = LabelConfig {
            enabled: true,
            static_labels: HashMap::from([("env".to_string(), "prod".to_string())]),
            dynamic: vec![DynamicLabelEntry {
                key: "name-lc".into(),
                source: LabelValueSource::XrField,
                path: Some("metadata.name".into()),
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
                label_key: "kubecore.io/namespace".into(),
            },
            merge_strategy: MergeStrategy::Merge,
            enforce_labels: vec![],
        };

        let out = inject(&root, &config, "kube-system").unwrap();
        assert_eq!(out.get("existing").map(String::as_str), Some("v1"));
        assert_eq!(out.get("env").map(String::as_str), Some("prod"));
        assert_eq!(out.get("name-lc").map(String::as_str), Some("prod-cluster"));
        assert_eq!(out.get("kubecore.io/namespace").map(String::as_str), Some("team-a"));
    }

    #[test]
    fn enforce_labels_blocks_value_change_under_merge() {
        let root = root_with("demo", "team-a", &[("env", "staging")]);
        let config = LabelConfig {
            enabled: true,
            static_labels: HashMap::from([("env".to_string(), "prod".to_string())]),
            enforce_labels: vec!["env".to_string()],
            ..LabelConfig::default()
        };
        assert!(inject(&root, &config, "kube-system").is_err());
    }

    #[test]
    fn optional_dynamic_entry_failure_is_dropped_not_fatal() {
        let root = root_with("demo", "team-a", &[]);
        let config = LabelConfig {
            enabled: true,
            dynamic: vec![DynamicLabelEntry {
                key: "missing".into(),
                source: LabelValueSource::XrField,
                path: Some("spec.doesNotExist".into()),
                env_var: None,
                constant: None,
                transform: vec![],
                required: false,
            }],
            ..LabelConfig::default()
        };
        let out = inject(&root, &config, "kube-system").unwrap();
        assert!(!out.contains_key("missing"));
    }

    #[test]
    fn required_dynamic_entry_failure_is_fatal() {
        let root = root_with("demo", "team-a", &[]);
        let config = LabelConfig {
            enabled: true,
            dynamic: vec![DynamicLabelEntry {
                key: "missing".into(),
                source: LabelValueSource::XrField,
                path: Some("spec.doesNotExist".into()),
                env_var: None,
                constant: None,
                transform: vec![],
                required: true,
            }],
            ..LabelConfig::default()
        };
        assert!(inject(&root, &config, "kube-system").is_err());
    }
}
