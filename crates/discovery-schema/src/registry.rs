//! C2 — Schema Registry (spec §4.2): `Get(gvk)`, `ListMatching(groupPatterns)`,
//! `Plural(gvk)`, operating in `embedded`, `dynamic`, or `hybrid` mode.

use crate::{dynamic, embedded};
use async_trait::async_trait;
use dashmap::DashMap;
use discovery_core::{ClusterReader, Gvk, RegistryMode, RegistrySettings, Result, SchemaDescriptor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn get(&self, gvk: &Gvk) -> Option<SchemaDescriptor>;

    /// All known GVKs whose group matches one of `API_GROUP_PATTERNS`
    /// (used by selector-based discovery when a request doesn't pin a kind).
    async fn list_matching(&self) -> Vec<Gvk>;

    /// Best-effort plural form for building the wire path; falls back to a
    /// naive lowercase-plus-`s` pluralisation when the registry has never
    /// seen the kind (embedded table and CRD summaries both carry the real
    /// plural, so this fallback only fires for truly unknown kinds).
    fn plural(&self, gvk: &Gvk) -> String {
        naive_plural(&gvk.kind)
    }

    /// Number of CRDs the dynamic discovery pass matched by group but could
    /// not turn into a `SchemaDescriptor` (spec §4.2), surfaced in the final
    /// summary as `schema_parse_failures`. Zero for registries with no
    /// dynamic component.
    fn schema_parse_failures(&self) -> usize {
        0
    }
}

fn naive_plural(kind: &str) -> String {
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

struct CacheEntry {
    descriptor: SchemaDescriptor,
    fetched_at: Instant,
}

/// The registry as actually constructed from `RegistrySettings`: an embedded
/// table that's always available, an optional live CRD-enumerated table
/// refreshed on a `cacheTtl` cadence, and the mode that decides how the two
/// combine (spec §4.2 table).
pub struct HybridRegistry {
    mode: RegistryMode,
    fallback_enabled: bool,
    cache_enabled: bool,
    cache_ttl: Duration,
    cluster: Option<Arc<dyn ClusterReader>>,
    api_group_patterns: Vec<String>,
    discovery_timeout: Duration,
    dynamic_cache: DashMap<Gvk, CacheEntry>,
    parse_failures: AtomicUsize,
}

impl HybridRegistry {
    pub fn new(settings: &RegistrySettings, cluster: Option<Arc<dyn ClusterReader>>) -> Self {
        Self {
            mode: settings.registry_mode,
            fallback_enabled: settings.fallback_enabled,
            cache_enabled: settings.cache_enabled,
            cache_ttl: settings.cache_ttl,
            cluster,
            api_group_patterns: settings.api_group_patterns.clone(),
            discovery_timeout: settings.discovery_timeout,
            dynamic_cache: DashMap::new(),
            parse_failures: AtomicUsize::new(0),
        }
    }

    /// Forces a fresh CRD enumeration pass, replacing whatever the cache held.
    /// Called lazily by `get`/`list_matching` once entries go stale.
    async fn refresh_dynamic(&self) {
        let Some(cluster) = self.cluster.clone() else {
            return;
        };
        match dynamic::discover(cluster, &self.api_group_patterns, self.discovery_timeout).await {
            Ok(outcome) => {
                info!(count = outcome.table.len(), parse_failures = outcome.parse_failures, "dynamic schema discovery refreshed");
                self.dynamic_cache.clear();
                let now = Instant::now();
                for (gvk, descriptor) in outcome.table {
                    self.dynamic_cache.insert(gvk, CacheEntry { descriptor, fetched_at: now });
                }
                self.parse_failures.fetch_add(outcome.parse_failures, Ordering::Relaxed);
            }
            Err(err) => warn!(error = %err, "dynamic schema discovery failed, keeping stale cache"),
        }
    }

    fn dynamic_is_stale(&self) -> bool {
        if !self.cache_enabled {
            return true;
        }
        match self.dynamic_cache.iter().next() {
            None => true,
            Some(entry) => entry.fetched_at.elapsed() > self.cache_ttl,
        }
    }

    async fn ensure_dynamic_fresh(&self) {
        if self.cluster.is_some() && self.dynamic_is_stale() {
            self.refresh_dynamic().await;
        }
    }

    fn dynamic_get(&self, gvk: &Gvk) -> Option<SchemaDescriptor> {
        self.dynamic_cache.get(gvk).map(|e| e.descriptor.clone())
    }
}

#[async_trait]
impl SchemaRegistry for HybridRegistry {
    async fn get(&self, gvk: &Gvk) -> Option<SchemaDescriptor> {
        match self.mode {
            RegistryMode::Embedded => embedded::lookup(gvk),
            RegistryMode::Dynamic => {
                self.ensure_dynamic_fresh().await;
                match self.dynamic_get(gvk) {
                    Some(d) => Some(d),
                    None if self.fallback_enabled => {
                        if let Some(d) = embedded::lookup(gvk) {
                            warn!(%gvk, "dynamic lookup miss, falling back to embedded schema");
                            return Some(d);
                        }
                        None
                    }
                    None => None,
                }
            }
            RegistryMode::Hybrid => {
                self.ensure_dynamic_fresh().await;
                if let Some(d) = self.dynamic_get(gvk) {
                    return Some(d);
                }
                embedded::lookup(gvk)
            }
        }
    }

    async fn list_matching(&self) -> Vec<Gvk> {
        let mut gvks = match self.mode {
            RegistryMode::Embedded => Vec::new(),
            RegistryMode::Dynamic | RegistryMode::Hybrid => {
                self.ensure_dynamic_fresh().await;
                self.dynamic_cache.iter().map(|e| e.key().clone()).collect()
            }
        };

        if matches!(self.mode, RegistryMode::Embedded | RegistryMode::Hybrid)
            || (self.mode == RegistryMode::Dynamic && self.fallback_enabled)
        {
            for gvk in embedded::all_gvks() {
                if !gvks.contains(&gvk) {
                    gvks.push(gvk);
                }
            }
        }

        gvks
    }

    fn plural(&self, gvk: &Gvk) -> String {
        if let Some(entry) = self.dynamic_cache.get(gvk) {
            if let Some(plural) = &entry.descriptor.plural {
                return plural.clone();
            }
        }
        naive_plural(&gvk.kind)
    }

    fn schema_parse_failures(&self) -> usize {
        self.parse_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naive_plural_handles_common_suffixes() {
        assert_eq!(naive_plural("Secret"), "secrets");
        assert_eq!(naive_plural("Policy"), "policies");
        assert_eq!(naive_plural("Class"), "classes");
    }

    #[tokio::test]
    async fn embedded_mode_never_touches_cluster() {
        let settings = RegistrySettings {
            registry_mode: RegistryMode::Embedded,
            ..RegistrySettings::default()
        };
        let registry = HybridRegistry::new(&settings, None);
        let gvk = Gvk::new("", "v1", "Secret");
        assert!(registry.get(&gvk).await.is_some());
    }
}
