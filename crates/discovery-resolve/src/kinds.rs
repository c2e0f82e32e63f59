//! Small embedded tables for kinds the rest of the crate can't derive purely
//! from a request: which kinds are cluster-scoped (spec §4.8 "special
//! cases"), and the fixed `(kind -> apiVersion)` mapping for core Kubernetes
//! kinds referenced without an explicit `apiVersion` (spec §4.8).

use discovery_core::Scope;

/// `(group, kind)` pairs known to be cluster-scoped regardless of what a
/// schema or a naive heuristic would suggest.
const CLUSTER_SCOPED: &[(&str, &str)] = &[
    ("kubecore.io", "GithubProvider"),
    ("kubecore.io", "ClusterKubeCluster"),
    ("apiextensions.crossplane.io", "Composition"),
    ("apiextensions.crossplane.io", "CompositeResourceDefinition"),
];

pub fn scope_for(group: &str, kind: &str) -> Option<Scope> {
    CLUSTER_SCOPED
        .iter()
        .any(|(g, k)| *g == group && *k == kind)
        .then_some(Scope::ClusterScoped)
}

/// Fixed `(kind -> apiVersion)` for core (empty-group) kinds. A reference
/// field that names one of these kinds without an `apiVersion` never falls
/// back to guessing — core kinds are always resolvable exactly (spec §4.8:
/// "never fabricated for core k8s kinds").
const CORE_KIND_VERSIONS: &[(&str, &str)] = &[
    ("Secret", "v1"),
    ("ConfigMap", "v1"),
    ("Service", "v1"),
    ("PersistentVolumeClaim", "v1"),
    ("ServiceAccount", "v1"),
    ("Pod", "v1"),
    ("Namespace", "v1"),
    ("Node", "v1"),
    ("Endpoints", "v1"),
];

pub fn core_api_version(kind: &str) -> Option<&'static str> {
    CORE_KIND_VERSIONS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, v)| *v)
}

/// Fallback pluralisation used when neither a CRD summary nor the schema
/// registry has the real plural on hand.
pub fn naive_plural(kind: &str) -> String {
    let lower = kind.to_ascii_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") || lower.ends_with('x') {
        format!("{lower}es")
    } else if let Some(stem) = lower.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
        format!("{lower}s")
    } else {
        format!("{lower}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_provider_is_cluster_scoped() {
        assert_eq!(scope_for("kubecore.io", "GithubProvider"), Some(Scope::ClusterScoped));
    }

    #[test]
    fn unknown_kind_has_no_special_scope() {
        assert_eq!(scope_for("kubecore.io", "GitHubProject"), None);
    }

    #[test]
    fn secret_has_fixed_core_version() {
        assert_eq!(core_api_version("Secret"), Some("v1"));
    }
}
