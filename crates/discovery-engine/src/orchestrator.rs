//! Wires the Label Injector (C4), Phase-1 Direct Resolver (C5), Phase-2
//! Selector Resolver (C6), Phase-3 Traversal Engine (C12), and the Response
//! Assembler (C13) into the one `discover()` entry point (spec §5).

use crate::assembler::assemble;
use discovery_core::graph_model::Source;
use discovery_core::invocation::{
    DiscoveryGraphOutput, FetchResult, InvocationWarning, MatchType, PerPhaseSummary, Request, Response,
};
use discovery_core::{ClusterReader, DiscoveryError, FetchStatus, InvocationId, RegistrySettings, Resource, ResourceNode, TerminationReason};
use discovery_graph::{ExecutionCache, GraphBuilder, TraversalEngine};
use discovery_resolve::{DirectResolver, ScopeFilter, SelectorResolver};
use discovery_schema::{HybridRegistry, SchemaRegistry};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Runs one invocation end to end against an already-authenticated cluster
/// reader. Construction/authentication of the underlying `kube::Client`
/// stays the caller's job (spec §1); `discovery-resolve::KubeClusterReader`
/// is the real `ClusterReader` to pass here outside of tests.
#[instrument(skip_all, fields(invocation_id = tracing::field::Empty))]
pub async fn discover(request: Request, cluster: Arc<dyn ClusterReader>) -> Result<Response, DiscoveryError> {
    let invocation_id = InvocationId::new();
    tracing::Span::current().record("invocation_id", tracing::field::display(&invocation_id));
    let started = Instant::now();
    info!(%invocation_id, "discovery invocation started");

    let settings = RegistrySettings::from_env()?;
    let registry: Arc<dyn SchemaRegistry> = Arc::new(HybridRegistry::new(&settings, Some(cluster.clone())));

    let mut mutated_root = request.root.clone();
    let injected_labels = discovery_labels::inject(&mutated_root, &request.xr_labels, &request.function_namespace)?;
    *mutated_root.labels_mut() = injected_labels;

    let mut resources: HashMap<String, FetchResult> = HashMap::new();
    let mut multi_resources: HashMap<String, Vec<Resource>> = HashMap::new();
    let mut warnings = Vec::new();
    let mut per_phase = PerPhaseSummary::default();
    let mut seed_nodes: Vec<ResourceNode> = Vec::new();

    let direct_resolver = DirectResolver::new(cluster.clone());
    let selector_resolver = SelectorResolver::new(cluster.clone());

    run_phase1(&request, &direct_resolver, &mut resources, &mut per_phase, &mut seed_nodes).await?;
    run_phase2(&request, &selector_resolver, &mut multi_resources, &mut warnings, &mut per_phase, &mut seed_nodes).await?;

    let mut graph = GraphBuilder::new(request.traversal_config.max_cycles);
    let mut seed_uids = Vec::with_capacity(seed_nodes.len());
    for node in seed_nodes {
        seed_uids.push(node.uid.clone());
        graph.add_node(node);
    }

    let phase1_phase2_timeouts =
        resources.values().filter(|r| r.status == FetchStatus::Timeout).count();

    let (graph_output, timeout_count, cache_hit_rate) = if request.traversal_config.enabled {
        let scope_filter = ScopeFilter::new(request.scope_filter.clone());
        let cache = Arc::new(ExecutionCache::new(
            request.traversal_config.cache_strategy,
            settings.cache_ttl,
            request.traversal_config.max_cache_size_bytes,
            request.traversal_config.gc_threshold_bytes,
        ));
        let engine = TraversalEngine::new(cluster.clone(), registry.clone(), scope_filter, cache, request.traversal_config.clone());

        let output = engine.run(graph, seed_uids, CancellationToken::new()).await?;

        let fetched = output.stats.fetched.load(Ordering::Relaxed);
        let timed_out = output.stats.timed_out.load(Ordering::Relaxed);
        let unresolved = output.stats.reference_unresolved.load(Ordering::Relaxed);
        let schema_unavailable = output.stats.schema_unavailable.load(Ordering::Relaxed);
        per_phase.phase3.successful = fetched;
        per_phase.phase3.failed = unresolved + schema_unavailable;
        per_phase.phase3.skipped = timed_out;

        let hits = output.stats.cache_hits.load(Ordering::Relaxed);
        let misses = output.stats.cache_misses.load(Ordering::Relaxed);
        let cache_hit_rate = if hits + misses == 0 { 0.0 } else { hits as f64 / (hits + misses) as f64 };

        let graph_output = DiscoveryGraphOutput {
            nodes: output.graph.nodes().cloned().collect(),
            edges: output.graph.edges().to_vec(),
            cycles: output.graph.cycles().to_vec(),
            termination_reason: output.termination_reason,
        };

        (Some(graph_output), phase1_phase2_timeouts + timed_out, cache_hit_rate)
    } else {
        let graph_output = DiscoveryGraphOutput {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().to_vec(),
            cycles: graph.cycles().to_vec(),
            termination_reason: TerminationReason::Completed,
        };
        (Some(graph_output), phase1_phase2_timeouts, 0.0)
    };

    // CRD schemas that matched a watched group but failed to parse into a
    // usable descriptor (spec §4.2) — a registry-level count, distinct from
    // the per-resource `SchemaUnavailable` fetch status folded into `failed`
    // above.
    let schema_parse_failures = registry.schema_parse_failures();

    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(%invocation_id, elapsed_ms, "discovery invocation completed");

    Ok(assemble(
        resources,
        multi_resources,
        mutated_root,
        warnings,
        per_phase,
        graph_output,
        timeout_count,
        schema_parse_failures,
        cache_hit_rate,
        elapsed_ms,
    ))
}

#[instrument(skip_all)]
async fn run_phase1(
    request: &Request,
    resolver: &DirectResolver,
    resources: &mut HashMap<String, FetchResult>,
    per_phase: &mut PerPhaseSummary,
    seed_nodes: &mut Vec<ResourceNode>,
) -> Result<(), DiscoveryError> {
    for req in request.fetch_resources.iter().filter(|r| r.match_type == MatchType::Direct) {
        let (resource, status) = resolver.resolve(req, request.fetch_timeout).await;

        // A non-success status is never invocation-terminal by itself (spec
        // §7 only terminates on invocation-wide conditions); `optional`
        // just decides whether it counts as `failed` or `skipped`.
        if status.is_success() {
            per_phase.phase1.successful += 1;
        } else if req.optional {
            per_phase.phase1.skipped += 1;
        } else {
            per_phase.phase1.failed += 1;
        }

        if let Some(resource) = &resource {
            if let Some(node) = seed_node(resource, Source::Direct) {
                seed_nodes.push(node);
            }
        }

        resources.insert(req.into.clone(), FetchResult { status, resource });
    }
    Ok(())
}

#[instrument(skip_all)]
async fn run_phase2(
    request: &Request,
    resolver: &SelectorResolver,
    multi_resources: &mut HashMap<String, Vec<Resource>>,
    warnings: &mut Vec<InvocationWarning>,
    per_phase: &mut PerPhaseSummary,
    seed_nodes: &mut Vec<ResourceNode>,
) -> Result<(), DiscoveryError> {
    for req in request
        .fetch_resources
        .iter()
        .filter(|r| matches!(r.match_type, MatchType::Label | MatchType::Expression))
    {
        // InvalidSelector/InvalidExpression/UnsupportedMatchType and a
        // failOnConstraintViolation breach are terminal regardless of
        // `optional` (spec §7's table only grants `optional` recovery to
        // NotFound-style per-resource failures, not malformed requests).
        let outcome = resolver.resolve(req, &request.function_namespace, &[]).await?;

        if let Some(violation) = outcome.constraint_violation {
            warnings.push(InvocationWarning { into: Some(req.into.clone()), message: violation });
        }

        if !outcome.resources.is_empty() {
            per_phase.phase2.successful += 1;
        } else if req.optional {
            per_phase.phase2.skipped += 1;
        } else {
            per_phase.phase2.failed += 1;
        }

        let source = if req.match_type == MatchType::Label { Source::Label } else { Source::Expression };
        for resource in &outcome.resources {
            if let Some(node) = seed_node(resource, source) {
                seed_nodes.push(node);
            }
        }

        multi_resources.insert(req.into.clone(), outcome.resources);
    }
    Ok(())
}

fn seed_node(resource: &Resource, source: Source) -> Option<ResourceNode> {
    let uid = resource.uid()?.to_string();
    Some(ResourceNode { uid, resource: resource.clone(), depth: 0, discovery_path: vec![], source })
}
