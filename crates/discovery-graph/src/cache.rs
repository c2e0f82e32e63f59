//! C9 — Execution Cache (spec §4.9): two logical maps (schema by gvk,
//! resource by `(gvr, namespace, name)`, both also reachable by `uid` once
//! known) sharing one byte budget, evicted by LRU, LFU, or TTL.

use discovery_core::invocation::EvictionStrategy;
use discovery_core::{Gvk, Resource, SchemaDescriptor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry<V> {
    value: V,
    size_bytes: usize,
    inserted_at: Instant,
    last_used_at: Instant,
    hits: u64,
}

/// Resource cache key: a gvr/namespace/name triple, or a bare uid once the
/// resource has been fetched at least once (spec §4.9: "keys also by uid
/// once known, so deduplication works even when two paths reach a resource
/// by different aliases").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    ById { gvr: String, namespace: Option<String>, name: String },
    ByUid(String),
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    total_bytes: usize,
}

impl<K: std::hash::Hash + Eq + Clone, V: Clone> Inner<K, V> {
    fn new() -> Self {
        Self { entries: HashMap::new(), total_bytes: 0 }
    }

    fn insert(&mut self, key: K, value: V, size_bytes: usize, budget: usize, ttl: Duration, strategy: EvictionStrategy) {
        let now = Instant::now();
        if let Some(existing) = self.entries.remove(&key) {
            self.total_bytes = self.total_bytes.saturating_sub(existing.size_bytes);
        }
        self.entries.insert(
            key,
            Entry { value, size_bytes, inserted_at: now, last_used_at: now, hits: 0 },
        );
        self.total_bytes += size_bytes;
        self.evict_to_budget(budget, ttl, strategy);
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.get_mut(key)?;
        entry.last_used_at = Instant::now();
        entry.hits += 1;
        Some(entry.value.clone())
    }

    fn evict_to_budget(&mut self, budget: usize, ttl: Duration, strategy: EvictionStrategy) {
        if strategy == EvictionStrategy::Ttl {
            let now = Instant::now();
            let expired: Vec<K> = self
                .entries
                .iter()
                .filter(|(_, e)| now.duration_since(e.inserted_at) > ttl)
                .map(|(k, _)| k.clone())
                .collect();
            for k in expired {
                if let Some(e) = self.entries.remove(&k) {
                    self.total_bytes = self.total_bytes.saturating_sub(e.size_bytes);
                }
            }
        }

        while self.total_bytes > budget {
            let victim = match strategy {
                EvictionStrategy::Lru => self.entries.iter().min_by_key(|(_, e)| e.last_used_at).map(|(k, _)| k.clone()),
                EvictionStrategy::Lfu => self.entries.iter().min_by_key(|(_, e)| e.hits).map(|(k, _)| k.clone()),
                EvictionStrategy::Ttl => self.entries.iter().min_by_key(|(_, e)| e.inserted_at).map(|(k, _)| k.clone()),
            };
            let Some(victim) = victim else { break };
            if let Some(e) = self.entries.remove(&victim) {
                self.total_bytes = self.total_bytes.saturating_sub(e.size_bytes);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct ExecutionCache {
    strategy: EvictionStrategy,
    ttl: Duration,
    max_bytes: usize,
    gc_threshold_bytes: usize,
    schemas: Mutex<Inner<Gvk, SchemaDescriptor>>,
    resources: Mutex<Inner<ResourceKey, Resource>>,
}

fn estimate_resource_bytes(resource: &Resource) -> usize {
    serde_json::to_vec(resource).map(|v| v.len()).unwrap_or(256)
}

fn estimate_schema_bytes(schema: &SchemaDescriptor) -> usize {
    serde_json::to_vec(schema).map(|v| v.len()).unwrap_or(256)
}

impl ExecutionCache {
    pub fn new(strategy: EvictionStrategy, ttl: Duration, max_bytes: usize, gc_threshold_bytes: usize) -> Self {
        Self {
            strategy,
            ttl,
            max_bytes,
            gc_threshold_bytes,
            schemas: Mutex::new(Inner::new()),
            resources: Mutex::new(Inner::new()),
        }
    }

    fn budget_for_resources(&self) -> usize {
        // Each logical map is capped at half the budget; the gc threshold
        // acts as a soft pre-eviction trigger checked by callers before a
        // large insert (spec §5 "gcThreshold triggers cache eviction ahead
        // of the hard ceiling").
        self.max_bytes / 2
    }

    pub fn put_schema(&self, gvk: Gvk, schema: SchemaDescriptor) {
        let size = estimate_schema_bytes(&schema);
        let mut inner = self.schemas.lock();
        inner.insert(gvk, schema, size, self.budget_for_resources(), self.ttl, self.strategy);
    }

    pub fn get_schema(&self, gvk: &Gvk) -> Option<SchemaDescriptor> {
        self.schemas.lock().get(gvk)
    }

    pub fn put_resource(&self, key: ResourceKey, resource: Resource) {
        let size = estimate_resource_bytes(&resource);
        let uid = resource.uid().map(str::to_string);
        let mut inner = self.resources.lock();
        inner.insert(key, resource.clone(), size, self.budget_for_resources(), self.ttl, self.strategy);
        if let Some(uid) = uid {
            inner.insert(ResourceKey::ByUid(uid), resource, size, self.budget_for_resources(), self.ttl, self.strategy);
        }
    }

    pub fn get_resource(&self, key: &ResourceKey) -> Option<Resource> {
        self.resources.lock().get(key)
    }

    pub fn get_resource_by_uid(&self, uid: &str) -> Option<Resource> {
        self.resources.lock().get(&ResourceKey::ByUid(uid.to_string()))
    }

    pub fn should_gc(&self) -> bool {
        let resources_bytes = self.resources.lock().total_bytes;
        let schemas_bytes = self.schemas.lock().total_bytes;
        resources_bytes + schemas_bytes > self.gc_threshold_bytes
    }

    pub fn resource_count(&self) -> usize {
        self.resources.lock().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheHitStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheHitStats {
    pub fn rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::Scope;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::api::DynamicObject;

    fn resource(name: &str, uid: &str) -> Resource {
        let dynamic = DynamicObject {
            types: None,
            metadata: ObjectMeta { name: Some(name.into()), uid: Some(uid.into()), ..Default::default() },
            data: serde_json::json!({}),
        };
        Resource::from_dynamic(Gvk::new("", "v1", "Secret"), Scope::Namespaced, dynamic)
    }

    #[test]
    fn resource_is_reachable_by_uid_after_insert() {
        let cache = ExecutionCache::new(EvictionStrategy::Lru, Duration::from_secs(60), 1024 * 1024, 512 * 1024);
        let key = ResourceKey::ById { gvr: "v1/secrets".into(), namespace: Some("team-a".into()), name: "creds".into() };
        cache.put_resource(key.clone(), resource("creds", "uid-1"));
        assert!(cache.get_resource(&key).is_some());
        assert!(cache.get_resource_by_uid("uid-1").is_some());
    }

    #[test]
    fn lru_evicts_least_recently_used_when_over_budget() {
        let cache = ExecutionCache::new(EvictionStrategy::Lru, Duration::from_secs(60), 200, 100);
        for i in 0..20 {
            let key = ResourceKey::ById { gvr: "v1/secrets".into(), namespace: None, name: format!("r{i}") };
            cache.put_resource(key, resource(&format!("r{i}"), &format!("uid-{i}")));
        }
        assert!(cache.resource_count() * 1 < 40);
    }
}
