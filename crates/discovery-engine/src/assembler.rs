//! C13 — Response Assembler (spec §4.13): folds the three phases' results,
//! the mutated root, and the traversal's graph into the one `Response`
//! record the invocation returns.

use discovery_core::invocation::{DiscoveryGraphOutput, FetchResult, InvocationWarning, PerPhaseSummary, Response, Summary};
use discovery_core::Resource;
use std::collections::HashMap;

#[allow(clippy::too_many_arguments)]
pub fn assemble(
    resources: HashMap<String, FetchResult>,
    multi_resources: HashMap<String, Vec<Resource>>,
    mutated_root: Resource,
    warnings: Vec<InvocationWarning>,
    per_phase: PerPhaseSummary,
    graph: Option<DiscoveryGraphOutput>,
    timeout_count: usize,
    schema_parse_failures: usize,
    cache_hit_rate: f64,
    elapsed_ms: u64,
) -> Response {
    let total = phase_total(&per_phase);
    let successful = per_phase.phase1.successful + per_phase.phase2.successful + per_phase.phase3.successful;
    let failed = per_phase.phase1.failed + per_phase.phase2.failed + per_phase.phase3.failed;
    let skipped = per_phase.phase1.skipped + per_phase.phase2.skipped + per_phase.phase3.skipped;

    let summary = Summary {
        total,
        successful,
        failed,
        skipped,
        timeout_count,
        schema_parse_failures,
        per_phase,
        elapsed_ms,
        cache_hit_rate,
    };

    Response { resources, multi_resources, summary, graph, mutated_root, warnings }
}

fn phase_total(per_phase: &PerPhaseSummary) -> usize {
    let counters = [&per_phase.phase1, &per_phase.phase2, &per_phase.phase3];
    counters.iter().map(|c| c.successful + c.failed + c.skipped).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::invocation::PhaseCounters;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::api::DynamicObject;

    fn root() -> Resource {
        let dynamic = DynamicObject { types: None, metadata: ObjectMeta { name: Some("demo".into()), ..Default::default() }, data: serde_json::json!({}) };
        Resource::from_dynamic(discovery_core::Gvk::new("kubecore.io", "v1alpha1", "KubeCluster"), discovery_core::Scope::Namespaced, dynamic)
    }

    #[test]
    fn sums_counters_across_phases() {
        let per_phase = PerPhaseSummary {
            phase1: PhaseCounters { successful: 2, failed: 1, skipped: 0 },
            phase2: PhaseCounters { successful: 3, failed: 0, skipped: 1 },
            phase3: PhaseCounters { successful: 5, failed: 0, skipped: 0 },
        };
        let response = assemble(HashMap::new(), HashMap::new(), root(), vec![], per_phase, None, 0, 0, 0.0, 12);
        assert_eq!(response.summary.total, 12);
        assert_eq!(response.summary.successful, 10);
        assert_eq!(response.summary.failed, 1);
        assert_eq!(response.summary.skipped, 1);
    }
}
