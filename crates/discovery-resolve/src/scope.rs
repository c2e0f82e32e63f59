//! C7 — Scope Filter (spec §4.7): `Admit(gvk, namespace) -> bool`.

use discovery_core::{Gvk, ScopeFilterConfig};
use globset::{Glob, GlobSet, GlobSetBuilder};

pub struct ScopeFilter {
    config: ScopeFilterConfig,
    include: GlobSet,
    exclude: GlobSet,
}

fn build_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

impl ScopeFilter {
    pub fn new(config: ScopeFilterConfig) -> Self {
        let include = build_set(&config.include_api_groups);
        let exclude = build_set(&config.exclude_api_groups);
        Self { config, include, exclude }
    }

    /// `Admit(gvk, namespace) -> bool`. `from_namespace` is the namespace of
    /// the edge's source node, used to decide whether `to`'s namespace makes
    /// this a cross-namespace edge.
    pub fn admit(&self, gvk: &Gvk, namespace: Option<&str>, from_namespace: Option<&str>) -> bool {
        if self.config.platform_only {
            let group_ok = self.include.is_match(&gvk.group) && !self.exclude.is_match(&gvk.group);
            if !group_ok {
                return false;
            }
        }

        if !self.config.allowed_kinds.is_empty() && !self.config.allowed_kinds.iter().any(|k| k == &gvk.kind) {
            return false;
        }
        if self.config.denied_kinds.iter().any(|k| k == &gvk.kind) {
            return false;
        }

        if let Some(ns) = namespace {
            if !self.config.allowed_namespaces.is_empty() && !self.config.allowed_namespaces.iter().any(|n| n == ns) {
                return false;
            }
            if self.config.denied_namespaces.iter().any(|n| n == ns) {
                return false;
            }
        }

        if !self.config.cross_namespace_enabled {
            if let (Some(from), Some(to)) = (from_namespace, namespace) {
                if from != to {
                    return false;
                }
            }
        }

        true
    }
}
