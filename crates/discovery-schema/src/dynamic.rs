//! The dynamic (CRD-enumerated) half of the Schema Registry (spec §4.2).

use crate::detector::{apply_confidence_floor, ReferenceDetector};
use discovery_core::{ClusterError, ClusterReader, CrdSummary, DiscoveryError, Gvk, Result, SchemaDescriptor};
use futures::stream::{FuturesUnordered, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Builds a `GlobSet` out of the configured `API_GROUP_PATTERNS` so a CRD's
/// group can be tested in O(1) instead of re-compiling patterns per CRD.
pub fn compile_group_patterns(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| DiscoveryError::Config(format!("invalid API_GROUP_PATTERNS entry {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| DiscoveryError::Config(format!("failed to compile API_GROUP_PATTERNS: {e}")))
}

/// Enumerates CRDs from the cluster, filters to groups matching `patterns`,
/// and parses each matching CRD's served-version OpenAPI schemas into
/// `SchemaDescriptor`s concurrently, bounded by `timeout` overall.
///
/// A single CRD failing to parse is logged and skipped — spec §4.2 treats
/// dynamic-mode discovery as best-effort, never fatal to the whole registry.
/// Result of one `discover()` pass: the parsed schema table plus how many
/// matching CRDs failed to yield a usable schema (spec §4.2: "CRD parse
/// failures are counted and skipped, never fatal" — surfaced in the final
/// summary as `schema_parse_failures`).
pub struct DiscoveryOutcome {
    pub table: HashMap<Gvk, SchemaDescriptor>,
    pub parse_failures: usize,
}

pub async fn discover(
    cluster: Arc<dyn ClusterReader>,
    patterns: &[String],
    timeout: Duration,
) -> Result<DiscoveryOutcome> {
    let group_set = compile_group_patterns(patterns)?;

    let crds = match tokio::time::timeout(timeout, cluster.list_crds()).await {
        Ok(Ok(crds)) => crds,
        Ok(Err(ClusterError::Forbidden)) => {
            warn!("listing CRDs was forbidden, dynamic schema discovery yields nothing");
            return Ok(DiscoveryOutcome { table: HashMap::new(), parse_failures: 0 });
        }
        Ok(Err(err)) => return Err(DiscoveryError::Internal(format!("listing CRDs failed: {err}"))),
        Err(_) => {
            warn!(?timeout, "CRD enumeration timed out, dynamic schema discovery yields nothing");
            return Ok(DiscoveryOutcome { table: HashMap::new(), parse_failures: 0 });
        }
    };

    let matching: Vec<CrdSummary> = crds
        .into_iter()
        .filter(|crd| group_set.is_match(&crd.group))
        .collect();

    debug!(count = matching.len(), "CRDs matched API_GROUP_PATTERNS");

    let mut tasks = FuturesUnordered::new();
    for crd in matching {
        tasks.push(tokio::task::spawn_blocking(move || parse_crd(crd)));
    }

    let mut table = HashMap::new();
    let mut parse_failures = 0usize;
    while let Some(joined) = tasks.next().await {
        match joined {
            Ok(Some((gvk, descriptor))) => {
                table.insert(gvk, descriptor);
            }
            Ok(None) => parse_failures += 1,
            Err(join_err) => {
                warn!(error = %join_err, "CRD schema parse task panicked");
                parse_failures += 1;
            }
        }
    }

    Ok(DiscoveryOutcome { table, parse_failures })
}

fn parse_crd(crd: CrdSummary) -> Option<(Gvk, SchemaDescriptor)> {
    // Prefer the latest served version with a schema attached; CRDs without
    // any parseable schema contribute nothing (counted, not fatal).
    let (version, schema) = crd
        .versions
        .into_iter()
        .rev()
        .find_map(|(v, schema)| schema.map(|s| (v, s)))?;

    let gvk = Gvk::new(crd.group.clone(), version, crd.kind.clone());

    let fields = match ReferenceDetector::detect(&schema) {
        Ok(fields) => apply_confidence_floor(fields),
        Err(err) => {
            warn!(kind = %crd.kind, group = %crd.group, error = %err, "failed to detect references in CRD schema");
            Vec::new()
        }
    };

    let mut descriptor = SchemaDescriptor::new(crd.scope);
    descriptor.reference_fields = fields;
    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        descriptor.required_fields = required
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
    }
    descriptor.plural = Some(crd.plural.clone());
    descriptor.open_api_schema = Some(schema);

    Some((gvk, descriptor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_wildcard_group_patterns() {
        let set = compile_group_patterns(&["*.kubecore.io".to_string()]).unwrap();
        assert!(set.is_match("platform.kubecore.io"));
        assert!(!set.is_match("apiextensions.crossplane.io"));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = compile_group_patterns(&["[".to_string()]).unwrap_err();
        assert!(matches!(err, DiscoveryError::Config(_)));
    }

    #[test]
    fn parse_crd_picks_latest_versioned_schema() {
        let crd = CrdSummary {
            group: "kubecore.io".into(),
            kind: "Widget".into(),
            plural: "widgets".into(),
            scope: discovery_core::Scope::Namespaced,
            versions: vec![
                ("v1alpha1".into(), None),
                (
                    "v1".into(),
                    Some(serde_json::json!({
                        "type": "object",
                        "properties": {
                            "spec": {
                                "type": "object",
                                "properties": {
                                    "secretRef": {"type": "object", "properties": {"name": {"type": "string"}}}
                                }
                            }
                        }
                    })),
                ),
            ],
        };
        let (gvk, descriptor) = parse_crd(crd).unwrap();
        assert_eq!(gvk.version, "v1");
        assert_eq!(descriptor.reference_fields.len(), 1);
    }
}
