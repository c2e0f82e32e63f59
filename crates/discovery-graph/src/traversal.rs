//! C12 — Traversal Engine (spec §4.12): BFS by depth, seeded from Phase-1
//! and Phase-2 results, bounded by depth/resource/time budgets.

use crate::batch::{BatchItemOutcome, BatchPlanner};
use crate::cache::{ExecutionCache, ResourceKey};
use crate::graph::{AddEdgeOutcome, GraphBuilder};
use discovery_core::graph_model::{DiscoveryHop, Source};
use discovery_core::invocation::{TraversalConfig, TraversalDirection};
use discovery_core::{ClusterError, ClusterReader, DiscoveryError, Gvr, ListQuery, Resource, ResourceEdge, ResourceNode, TerminationReason};
use discovery_resolve::{PendingFetch, ReferenceResolver, ScopeFilter};
use discovery_schema::SchemaRegistry;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct TraversalStats {
    pub fetched: AtomicUsize,
    pub timed_out: AtomicUsize,
    pub reference_unresolved: AtomicUsize,
    pub schema_unavailable: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub cache_misses: AtomicUsize,
}

impl Default for TraversalStats {
    fn default() -> Self {
        Self {
            fetched: AtomicUsize::new(0),
            timed_out: AtomicUsize::new(0),
            reference_unresolved: AtomicUsize::new(0),
            schema_unavailable: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            cache_misses: AtomicUsize::new(0),
        }
    }
}

pub struct TraversalEngine {
    cluster: Arc<dyn ClusterReader>,
    registry: Arc<dyn SchemaRegistry>,
    scope_filter: ScopeFilter,
    cache: Arc<ExecutionCache>,
    config: TraversalConfig,
}

pub struct TraversalOutput {
    pub graph: GraphBuilder,
    pub termination_reason: TerminationReason,
    pub stats: TraversalStats,
}

/// A reverse-direction candidate whose own outgoing reference resolves to
/// `target_uid`, already present in the graph.
struct ReverseMatch {
    candidate: Resource,
    target_uid: String,
    target_depth: usize,
    field_path: String,
    confidence: f64,
    ref_type: discovery_core::schema::RefType,
}

impl TraversalEngine {
    pub fn new(
        cluster: Arc<dyn ClusterReader>,
        registry: Arc<dyn SchemaRegistry>,
        scope_filter: ScopeFilter,
        cache: Arc<ExecutionCache>,
        config: TraversalConfig,
    ) -> Self {
        Self { cluster, registry, scope_filter, cache, config }
    }

    /// Runs BFS from `seeds` (Phase-1/Phase-2 results, already in the
    /// caller's graph as depth-0 nodes) out to `maxDepth`, subject to the
    /// resource/time budgets and cooperative cancellation.
    pub async fn run(
        &self,
        mut graph: GraphBuilder,
        seed_uids: Vec<String>,
        cancellation: CancellationToken,
    ) -> Result<TraversalOutput, DiscoveryError> {
        let stats = TraversalStats::default();
        let started_at = Instant::now();
        let mut visited: HashSet<String> = seed_uids.iter().cloned().collect();
        let mut frontier: VecDeque<String> = seed_uids.into();

        let batch_planner = BatchPlanner::new(
            self.config.batch_size,
            self.config.same_depth_batching,
            self.config.max_concurrent_requests,
            self.config.max_concurrent_batches,
            self.config.batch_timeout,
        );

        let mut termination = TerminationReason::Completed;

        'depth_loop: for depth in 0..self.config.max_depth {
            if frontier.is_empty() {
                break;
            }
            if started_at.elapsed() > self.config.timeout {
                termination = TerminationReason::TimeLimit;
                break;
            }
            if graph.node_count() >= self.config.max_resources {
                termination = TerminationReason::ResourceLimit;
                break;
            }

            let this_depth: Vec<String> = frontier.drain(..).collect();
            let this_depth_nodes: Vec<ResourceNode> =
                this_depth.iter().filter_map(|uid| graph.node(uid).cloned()).collect();
            let mut pending: Vec<(String, PendingFetch)> = Vec::new();

            if !matches!(self.config.direction, TraversalDirection::Reverse) {
                for uid in &this_depth {
                    if cancellation.is_cancelled() {
                        termination = TerminationReason::Cancelled;
                        break 'depth_loop;
                    }
                    let Some(node) = graph.node(uid).cloned() else { continue };
                    pending.extend(self.outgoing_for(&node).await.into_iter().map(|p| (uid.clone(), p)));
                }
            }

            let pending = self.filter_candidates(pending, &mut graph, &visited)?;

            // Reverse/bidirectional (spec §4.12): list candidates in the same
            // group/namespace as this hop's frontier and keep the ones whose
            // own outgoing references resolve back to a node already in the
            // graph (back-reference discovery). Run within the same hop as
            // the forward expansion above, before any of this hop's forward
            // fetches land, matching "both, in that order, within the same
            // hop".
            if matches!(self.config.direction, TraversalDirection::Reverse | TraversalDirection::Bidirectional) {
                if cancellation.is_cancelled() {
                    termination = TerminationReason::Cancelled;
                    break 'depth_loop;
                }
                for reverse_match in self.reverse_candidates(&this_depth_nodes, &graph).await {
                    self.admit_reverse_match(&mut graph, &mut visited, &mut frontier, reverse_match)?;
                }
                if graph.node_count() >= self.config.max_resources {
                    termination = TerminationReason::ResourceLimit;
                    break 'depth_loop;
                }
            }

            for batch in batch_planner.plan(pending) {
                if cancellation.is_cancelled() {
                    termination = TerminationReason::Cancelled;
                    break 'depth_loop;
                }
                if started_at.elapsed() > self.config.timeout {
                    termination = TerminationReason::TimeLimit;
                    break 'depth_loop;
                }

                let cluster = self.cluster.clone();
                let cache = self.cache.clone();
                let fetch_timeout = self.config.timeout;
                let results = batch_planner
                    .dispatch(batch, move |(_, item): (String, PendingFetch)| {
                        let cluster = cluster.clone();
                        let cache = cache.clone();
                        async move { fetch_pending(cluster, cache, item, fetch_timeout).await }
                    })
                    .await;

                for ((parent_uid, item), outcome) in results {
                    match outcome {
                        BatchItemOutcome::TimedOut => {
                            stats.timed_out.fetch_add(1, Ordering::Relaxed);
                            if !self.config.skip_missing_references {
                                warn!(target = %item.name, "required reference fetch timed out");
                            }
                        }
                        BatchItemOutcome::Completed(Ok((Some(resource), from_cache))) => {
                            stats.fetched.fetch_add(1, Ordering::Relaxed);
                            if from_cache {
                                stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                            } else {
                                stats.cache_misses.fetch_add(1, Ordering::Relaxed);
                            }
                            self.admit_fetched(&mut graph, &mut visited, &mut frontier, depth, &parent_uid, &item, resource)?;
                        }
                        BatchItemOutcome::Completed(Ok((None, from_cache))) => {
                            if !from_cache {
                                stats.cache_misses.fetch_add(1, Ordering::Relaxed);
                            }
                            stats.reference_unresolved.fetch_add(1, Ordering::Relaxed);
                        }
                        BatchItemOutcome::Completed(Err(err)) => {
                            if item.best_effort_gvk && matches!(err, ClusterError::NotFound) {
                                stats.schema_unavailable.fetch_add(1, Ordering::Relaxed);
                            } else {
                                stats.reference_unresolved.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }

                if graph.node_count() >= self.config.max_resources {
                    termination = TerminationReason::ResourceLimit;
                    break 'depth_loop;
                }
            }

            if depth + 1 >= self.config.max_depth && !frontier.is_empty() {
                termination = TerminationReason::DepthLimit;
            }
        }

        Ok(TraversalOutput { graph, termination_reason: termination, stats })
    }

    /// Reverse-direction candidates (spec §4.12): resources of any
    /// registry-known gvk in the same namespace(s) as `frontier_nodes` (or
    /// cluster-scoped) whose own outgoing references resolve to a node
    /// already present in `graph`. Each match carries the referrer resource
    /// plus the (already-known) target it points at.
    async fn reverse_candidates(&self, frontier_nodes: &[ResourceNode], graph: &GraphBuilder) -> Vec<ReverseMatch> {
        let mut namespaces: HashSet<Option<String>> = HashSet::new();
        for node in frontier_nodes {
            namespaces.insert(node.resource.namespace().map(str::to_string));
        }
        if namespaces.is_empty() {
            return Vec::new();
        }

        let candidate_gvks = self.registry.list_matching().await;
        let mut matches = Vec::new();

        for ns in &namespaces {
            for gvk in &candidate_gvks {
                if !self.scope_filter.admit(gvk, ns.as_deref(), ns.as_deref()) {
                    continue;
                }
                let gvr = Gvr::new(gvk.group.clone(), gvk.version.clone(), self.registry.plural(gvk));
                let candidates = match self.cluster.list(&gvr, &gvk.kind, ns.as_deref(), ListQuery::default()).await {
                    Ok(items) => items,
                    Err(_) => continue,
                };

                for candidate in candidates {
                    let schema = self.registry.get(&candidate.gvk).await;
                    let fields = schema.map(|s| s.reference_fields).unwrap_or_default();
                    let outgoing = ReferenceResolver::outgoing(&candidate, &fields, self.config.follow_owner_references);

                    for pending in outgoing {
                        if pending.confidence < self.config.min_confidence_threshold {
                            continue;
                        }
                        let target = graph.nodes().find(|n| {
                            n.resource.gvk == pending.gvk
                                && n.resource.name() == pending.name
                                && n.resource.namespace().map(str::to_string) == pending.namespace
                        });
                        if let Some(target) = target {
                            matches.push(ReverseMatch {
                                candidate: candidate.clone(),
                                target_uid: target.uid.clone(),
                                target_depth: target.depth,
                                field_path: pending.field_path.clone(),
                                confidence: pending.confidence,
                                ref_type: pending.ref_type.clone(),
                            });
                        }
                    }
                }
            }
        }

        matches
    }

    fn admit_reverse_match(
        &self,
        graph: &mut GraphBuilder,
        visited: &mut HashSet<String>,
        frontier: &mut VecDeque<String>,
        reverse_match: ReverseMatch,
    ) -> Result<(), DiscoveryError> {
        let Some(uid) = reverse_match.candidate.uid().map(str::to_string) else {
            return Ok(());
        };
        // The candidate references `target_uid`, which is already in the
        // graph; the candidate itself is the new node, one hop further out
        // than the target it points at.
        if uid == reverse_match.target_uid {
            return Ok(());
        }

        if !visited.contains(&uid) {
            let node = ResourceNode {
                uid: uid.clone(),
                discovery_path: vec![DiscoveryHop {
                    field_path: reverse_match.field_path.clone(),
                    target_gvk: reverse_match.candidate.gvk.clone(),
                }],
                depth: reverse_match.target_depth + 1,
                source: Source::Transitive,
                resource: reverse_match.candidate,
            };
            graph.add_node(node);
            visited.insert(uid.clone());
            frontier.push_back(uid.clone());
        }

        let edge = ResourceEdge::new(
            uid,
            reverse_match.target_uid,
            reverse_match.ref_type,
            reverse_match.field_path,
            reverse_match.confidence,
        );
        if let AddEdgeOutcome::CycleStop = graph.add_edge(edge, self.config.on_cycle_detected)? {
            debug!("reverse edge rejected, cycle policy stop");
        }
        Ok(())
    }

    async fn outgoing_for(&self, node: &ResourceNode) -> Vec<PendingFetch> {
        let schema = self.registry.get(&node.resource.gvk).await;
        let reference_fields = schema.map(|s| s.reference_fields).unwrap_or_default();
        ReferenceResolver::outgoing(&node.resource, &reference_fields, self.config.follow_owner_references)
    }

    /// Drops candidates below the confidence/scope bar, then splits the rest:
    /// a candidate whose (gvk, name, namespace) already matches a visited
    /// node needs no re-fetch, but it still names a real edge (spec §3: "a
    /// second fetch of the same resource ... only adds incoming edges") —
    /// including a back-edge that closes a cycle, which `add_edge` must see
    /// to populate `cycles` (spec §8 property 2). Only candidates that
    /// resolve to genuinely new resources are returned for batched fetching.
    fn filter_candidates(
        &self,
        pending: Vec<(String, PendingFetch)>,
        graph: &mut GraphBuilder,
        visited: &HashSet<String>,
    ) -> Result<Vec<(String, PendingFetch)>, DiscoveryError> {
        let mut to_fetch = Vec::new();

        for (parent_uid, p) in pending {
            if p.confidence < self.config.min_confidence_threshold {
                continue;
            }
            if !self.scope_filter.admit(&p.gvk, p.namespace.as_deref(), None) {
                continue;
            }

            let existing_uid = graph
                .nodes()
                .find(|n| {
                    n.resource.gvk == p.gvk
                        && n.resource.name() == p.name
                        && n.resource.namespace().map(str::to_string) == p.namespace
                        && visited.contains(&n.uid)
                })
                .map(|n| n.uid.clone());

            if let Some(uid) = existing_uid {
                let edge = ResourceEdge::new(parent_uid.clone(), uid.clone(), p.ref_type.clone(), p.field_path.clone(), p.confidence);
                if let AddEdgeOutcome::CycleStop = graph.add_edge(edge, self.config.on_cycle_detected)? {
                    debug!(from = %parent_uid, to = %uid, "edge to already-visited node rejected, cycle policy stop");
                }
                continue;
            }

            to_fetch.push((parent_uid, p));
        }

        Ok(to_fetch)
    }

    #[allow(clippy::too_many_arguments)]
    fn admit_fetched(
        &self,
        graph: &mut GraphBuilder,
        visited: &mut HashSet<String>,
        frontier: &mut VecDeque<String>,
        parent_depth: usize,
        parent_uid: &str,
        item: &PendingFetch,
        resource: Resource,
    ) -> Result<(), DiscoveryError> {
        let Some(uid) = resource.uid().map(str::to_string) else {
            return Ok(());
        };

        if !visited.contains(&uid) {
            let node = ResourceNode {
                uid: uid.clone(),
                discovery_path: vec![DiscoveryHop { field_path: item.field_path.clone(), target_gvk: resource.gvk.clone() }],
                depth: parent_depth + 1,
                source: Source::Transitive,
                resource,
            };
            graph.add_node(node);
            visited.insert(uid.clone());
            frontier.push_back(uid.clone());
        }

        let edge = ResourceEdge::new(parent_uid.to_string(), uid.clone(), item.ref_type.clone(), item.field_path.clone(), item.confidence);
        if let AddEdgeOutcome::CycleStop = graph.add_edge(edge, self.config.on_cycle_detected)? {
            // The child node stays reachable from elsewhere in the graph;
            // `CycleStop` only drops the one edge that would close the cycle.
            debug!(from = %parent_uid, to = %uid, "edge rejected, cycle policy stop");
        }
        Ok(())
    }
}

async fn fetch_pending(
    cluster: Arc<dyn ClusterReader>,
    cache: Arc<ExecutionCache>,
    item: PendingFetch,
    _timeout: Duration,
) -> Result<(Option<Resource>, bool), ClusterError> {
    let cache_key = ResourceKey::ById {
        gvr: item.gvk.api_version(),
        namespace: item.namespace.clone(),
        name: item.name.clone(),
    };
    if let Some(cached) = cache.get_resource(&cache_key) {
        return Ok((Some(cached), true));
    }

    let gvr = Gvr::new(item.gvk.group.clone(), item.gvk.version.clone(), discovery_resolve::kinds::naive_plural(&item.gvk.kind));
    let resource = cluster.get(&gvr, &item.gvk.kind, item.namespace.as_deref(), &item.name).await?;
    if let Some(resource) = &resource {
        cache.put_resource(cache_key, resource.clone());
    }
    debug!(name = %item.name, kind = %item.gvk.kind, "fetched referenced resource");
    Ok((resource, false))
}
