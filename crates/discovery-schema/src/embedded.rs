//! The embedded (static, compiled-in) half of the Schema Registry (spec §4.2).

use crate::detector::{apply_confidence_floor, ReferenceDetector};
use discovery_core::{Gvk, SchemaDescriptor, Scope};
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashMap;

/// A handful of representative kubecore/crossplane/core-k8s kinds, enough
/// to let the registry run fully offline (dynamic mode unavailable, or
/// `hybrid` falling back). Real deployments would ship a much larger
/// generated table; this embedded set is the fallback floor, not the
/// primary source of truth.
static EMBEDDED_TABLE: Lazy<HashMap<Gvk, SchemaDescriptor>> = Lazy::new(build_embedded_table);

pub fn lookup(gvk: &Gvk) -> Option<SchemaDescriptor> {
    EMBEDDED_TABLE.get(gvk).cloned()
}

pub fn all_gvks() -> Vec<Gvk> {
    EMBEDDED_TABLE.keys().cloned().collect()
}

fn descriptor_from_schema(scope: Scope, schema: serde_json::Value) -> SchemaDescriptor {
    let mut descriptor = SchemaDescriptor::new(scope);
    let fields = ReferenceDetector::detect(&schema).unwrap_or_default();
    descriptor.reference_fields = apply_confidence_floor(fields);
    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        descriptor.required_fields = required
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
    }
    descriptor.open_api_schema = Some(schema);
    descriptor
}

fn build_embedded_table() -> HashMap<Gvk, SchemaDescriptor> {
    let mut table = HashMap::new();

    table.insert(
        Gvk::new("kubecore.io", "v1alpha1", "KubeCluster"),
        descriptor_from_schema(
            Scope::Namespaced,
            json!({
                "type": "object",
                "required": ["spec"],
                "properties": {
                    "spec": {
                        "type": "object",
                        "properties": {
                            "providerConfigRef": {
                                "type": "object",
                                "properties": {"name": {"type": "string"}}
                            },
                            "credentialsSecretRef": {
                                "type": "object",
                                "properties": {
                                    "name": {"type": "string"},
                                    "namespace": {"type": "string"}
                                }
                            }
                        }
                    }
                }
            }),
        ),
    );

    table.insert(
        Gvk::new("kubecore.io", "v1alpha1", "GitHubProject"),
        descriptor_from_schema(
            Scope::Namespaced,
            json!({
                "type": "object",
                "required": ["spec"],
                "properties": {
                    "spec": {
                        "type": "object",
                        "properties": {
                            "clusterRef": {
                                "type": "object",
                                "properties": {
                                    "name": {"type": "string"},
                                    "namespace": {"type": "string"},
                                    "kind": {"type": "string"}
                                }
                            },
                            "webhookSecretRef": {
                                "type": "object",
                                "properties": {"name": {"type": "string"}}
                            }
                        }
                    }
                }
            }),
        ),
    );

    table.insert(
        Gvk::new("kubecore.io", "v1alpha1", "GithubProvider"),
        {
            let mut d = descriptor_from_schema(
                Scope::ClusterScoped,
                json!({
                    "type": "object",
                    "properties": {
                        "spec": {
                            "type": "object",
                            "properties": {
                                "credentialsSecretRef": {
                                    "type": "object",
                                    "properties": {
                                        "name": {"type": "string"},
                                        "namespace": {"type": "string"}
                                    }
                                }
                            }
                        }
                    }
                }),
            );
            d.scope = Scope::ClusterScoped;
            d
        },
    );

    table.insert(
        Gvk::new("", "v1", "Secret"),
        SchemaDescriptor::new(Scope::Namespaced),
    );
    table.insert(
        Gvk::new("", "v1", "ConfigMap"),
        SchemaDescriptor::new(Scope::Namespaced),
    );
    table.insert(
        Gvk::new("", "v1", "Service"),
        SchemaDescriptor::new(Scope::Namespaced),
    );
    table.insert(
        Gvk::new("", "v1", "PersistentVolumeClaim"),
        SchemaDescriptor::new(Scope::Namespaced),
    );

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kube_cluster_has_two_reference_fields() {
        let d = lookup(&Gvk::new("kubecore.io", "v1alpha1", "KubeCluster")).unwrap();
        assert_eq!(d.reference_fields.len(), 2);
    }

    #[test]
    fn github_provider_is_cluster_scoped() {
        let d = lookup(&Gvk::new("kubecore.io", "v1alpha1", "GithubProvider")).unwrap();
        assert_eq!(d.scope, Scope::ClusterScoped);
    }

    #[test]
    fn core_kinds_have_no_reference_fields() {
        let d = lookup(&Gvk::new("", "v1", "Secret")).unwrap();
        assert!(d.reference_fields.is_empty());
    }
}
