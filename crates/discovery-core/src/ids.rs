use serde::{Deserialize, Serialize};
use std::fmt;

/// (group, version, kind) — the schema-facing identity of a resource type.
///
/// Kept as a plain struct rather than re-exporting `kube::api::GroupVersionKind`
/// directly so the rest of the crate does not have to follow that type across
/// `kube` upgrades; `to_kube()`/`from_kube()` are the only crossing points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn from_api_version_kind(api_version: &str, kind: impl Into<String>) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Gvk::new(group, version, kind),
            None => Gvk::new("", api_version, kind),
        }
    }

    pub fn to_kube(&self) -> kube::api::GroupVersionKind {
        kube::api::GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
    }
}

/// (group, version, resource) — the wire identity used by `LIST`/`GET`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Gvr {
    pub fn new(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    pub fn to_api_resource(&self, kind: &str) -> kube::core::ApiResource {
        kube::core::ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: if self.group.is_empty() {
                self.version.clone()
            } else {
                format!("{}/{}", self.group, self.version)
            },
            kind: kind.to_string(),
            plural: self.resource.clone(),
        }
    }
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.version, self.resource)
    }
}

/// Resource scope, mirrors Kubernetes' own namespaced vs. cluster-scoped split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Namespaced,
    ClusterScoped,
}

/// `(group, version, kind, namespace, name)` — identifies a resource before it
/// has been fetched (and therefore before a `uid` is known).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub gvk: Gvk,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceId {
    pub fn new(gvk: Gvk, namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            gvk,
            namespace,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.gvk, ns, self.name),
            None => write!(f, "{}/{}", self.gvk, self.name),
        }
    }
}

/// Dedup key: a fetched resource is keyed by `uid` when known, falling back to
/// its `ResourceId` otherwise (spec §3: "deduplication is always by uid when
/// present, falling back to ResourceID").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DedupKey {
    Uid(String),
    Id(ResourceId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_joins_group_and_version() {
        let gvk = Gvk::new("kubecore.io", "v1alpha1", "KubeCluster");
        assert_eq!(gvk.api_version(), "kubecore.io/v1alpha1");
    }

    #[test]
    fn api_version_core_group_is_just_version() {
        let gvk = Gvk::new("", "v1", "Secret");
        assert_eq!(gvk.api_version(), "v1");
    }

    #[test]
    fn from_api_version_kind_roundtrips() {
        let gvk = Gvk::from_api_version_kind("kubecore.io/v1alpha1", "KubeCluster");
        assert_eq!(gvk.group, "kubecore.io");
        assert_eq!(gvk.version, "v1alpha1");
        let core = Gvk::from_api_version_kind("v1", "Secret");
        assert_eq!(core.group, "");
        assert_eq!(core.version, "v1");
    }
}
