use crate::ids::{Gvk, ResourceId, Scope};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A discovered Kubernetes resource, opaque to the engine except for the
/// small projection spec §3 allows: `uid`, metadata (labels, annotations,
/// owner references), `spec`, `status`.
///
/// Internally this wraps `kube::api::DynamicObject` — the engine never
/// deserializes a resource into a typed custom-resource struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub gvk: Gvk,
    pub scope: Scope,
    inner: DynamicObject,
}

impl Resource {
    pub fn from_dynamic(gvk: Gvk, scope: Scope, inner: DynamicObject) -> Self {
        Self { gvk, scope, inner }
    }

    pub fn name(&self) -> &str {
        self.inner.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.inner.metadata.namespace.as_deref()
    }

    pub fn uid(&self) -> Option<&str> {
        self.inner.metadata.uid.as_deref()
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.inner.metadata.labels.clone().unwrap_or_default()
    }

    pub fn labels_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.inner.metadata.labels.get_or_insert_with(Default::default)
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.inner.metadata.annotations.clone().unwrap_or_default()
    }

    pub fn owner_references(&self) -> &[OwnerReference] {
        self.inner
            .metadata
            .owner_references
            .as_deref()
            .unwrap_or(&[])
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(self.gvk.clone(), self.namespace().map(str::to_string), self.name())
    }

    /// The flattened `spec`/`status`/other top-level fields (everything that
    /// isn't `apiVersion`/`kind`/`metadata`), as `kube::api::DynamicObject`
    /// stores them.
    pub fn data(&self) -> &Value {
        &self.inner.data
    }

    pub fn data_mut(&mut self) -> &mut Value {
        &mut self.inner.data
    }

    /// Reconstructs the whole object (`apiVersion`, `kind`, `metadata`, and
    /// the flattened data) as one JSON value, for field paths that may
    /// reference any top-level section (`metadata.name`, `spec.foo`, ...).
    pub fn full_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("apiVersion".into(), Value::String(self.gvk.api_version()));
        map.insert("kind".into(), Value::String(self.gvk.kind.clone()));
        map.insert(
            "metadata".into(),
            serde_json::to_value(&self.inner.metadata).unwrap_or(Value::Null),
        );
        if let Value::Object(data_map) = &self.inner.data {
            for (k, v) in data_map {
                map.insert(k.clone(), v.clone());
            }
        }
        Value::Object(map)
    }

    pub fn into_dynamic(self) -> DynamicObject {
        self.inner
    }

    pub fn dynamic(&self) -> &DynamicObject {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn sample() -> Resource {
        let inner = DynamicObject {
            types: None,
            metadata: ObjectMeta {
                name: Some("demo-cluster".into()),
                namespace: Some("test".into()),
                uid: Some("abc-123".into()),
                ..Default::default()
            },
            data: serde_json::json!({"spec": {"providerConfigRef": {"name": "aws"}}}),
        };
        Resource::from_dynamic(
            Gvk::new("kubecore.io", "v1alpha1", "KubeCluster"),
            Scope::Namespaced,
            inner,
        )
    }

    #[test]
    fn projects_metadata_and_data() {
        let r = sample();
        assert_eq!(r.name(), "demo-cluster");
        assert_eq!(r.namespace(), Some("test"));
        assert_eq!(r.uid(), Some("abc-123"));
        assert_eq!(
            r.data()["spec"]["providerConfigRef"]["name"],
            Value::String("aws".into())
        );
    }

    #[test]
    fn full_value_merges_metadata_and_data() {
        let r = sample();
        let v = r.full_value();
        assert_eq!(v["kind"], "KubeCluster");
        assert_eq!(v["metadata"]["name"], "demo-cluster");
        assert_eq!(v["spec"]["providerConfigRef"]["name"], "aws");
    }
}
