//! C11 — Graph Builder & Cycle Detector (spec §4.11).

use discovery_core::invocation::CyclePolicy;
use discovery_core::{Cycle, DiscoveryError, ResourceEdge, ResourceNode};
use std::collections::{HashMap, HashSet};

pub struct GraphBuilder {
    nodes: HashMap<String, ResourceNode>,
    /// Insertion-ordered edge list; `HashSet`-style dedup is handled via
    /// `edge_keys` since `ResourceEdge`'s `Hash`/`Eq` already ignore
    /// `confidence` (spec §3 "no duplicate edges with the same (from, to,
    /// fieldPath)").
    edges: Vec<ResourceEdge>,
    edge_keys: HashSet<(String, String, String)>,
    /// Reverse adjacency (child -> parents), used for the ancestor check.
    reverse_adjacency: HashMap<String, Vec<String>>,
    cycles: Vec<Cycle>,
    max_cycles: usize,
}

pub enum AddEdgeOutcome {
    Inserted,
    CycleContinue,
    CycleStop,
}

impl GraphBuilder {
    pub fn new(max_cycles: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            edge_keys: HashSet::new(),
            reverse_adjacency: HashMap::new(),
            cycles: Vec::new(),
            max_cycles,
        }
    }

    /// Idempotent: re-adding a uid already present is a no-op.
    pub fn add_node(&mut self, node: ResourceNode) {
        self.nodes.entry(node.uid.clone()).or_insert(node);
    }

    pub fn has_node(&self, uid: &str) -> bool {
        self.nodes.contains_key(uid)
    }

    pub fn node(&self, uid: &str) -> Option<&ResourceNode> {
        self.nodes.get(uid)
    }

    /// `to` is already an ancestor of `from` iff a DFS along the reverse
    /// adjacency starting at `from` reaches `to`.
    fn is_ancestor(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from.to_string()];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(parents) = self.reverse_adjacency.get(&current) {
                stack.extend(parents.iter().cloned());
            }
        }
        false
    }

    pub fn add_edge(&mut self, edge: ResourceEdge, on_cycle: CyclePolicy) -> Result<AddEdgeOutcome, DiscoveryError> {
        let key = edge.dedup_key();
        if self.edge_keys.contains(&key) {
            return Ok(AddEdgeOutcome::Inserted);
        }

        if self.is_ancestor(&edge.from, &edge.to) {
            let nodes = self.cycle_path(&edge.from, &edge.to);
            match on_cycle {
                CyclePolicy::Fail => {
                    return Err(DiscoveryError::CycleDetected(format!(
                        "cycle closing edge {} -> {} via {}",
                        edge.from, edge.to, edge.field_path
                    )));
                }
                CyclePolicy::Stop => {
                    self.record_cycle(nodes, edge.clone());
                    self.insert_edge(edge, key);
                    return Ok(AddEdgeOutcome::CycleStop);
                }
                CyclePolicy::Continue => {
                    self.record_cycle(nodes, edge);
                    return Ok(AddEdgeOutcome::CycleContinue);
                }
            }
        }

        self.insert_edge(edge, key);
        Ok(AddEdgeOutcome::Inserted)
    }

    fn insert_edge(&mut self, edge: ResourceEdge, key: (String, String, String)) {
        self.reverse_adjacency.entry(edge.to.clone()).or_default().push(edge.from.clone());
        self.edge_keys.insert(key);
        self.edges.push(edge);
    }

    fn cycle_path(&self, from: &str, to: &str) -> Vec<String> {
        let mut path = vec![to.to_string()];
        let mut current = from.to_string();
        let mut seen = HashSet::new();
        while current != to {
            if !seen.insert(current.clone()) {
                break;
            }
            path.push(current.clone());
            current = self
                .reverse_adjacency
                .get(&current)
                .and_then(|parents| parents.first())
                .cloned()
                .unwrap_or_else(|| to.to_string());
        }
        path.push(to.to_string());
        path
    }

    fn record_cycle(&mut self, nodes: Vec<String>, closing_edge: ResourceEdge) {
        if self.cycles.len() >= self.max_cycles {
            return;
        }
        self.cycles.push(Cycle { nodes, closing_edge });
    }

    /// Tarjan's algorithm, restricted to components of size > 1 (true
    /// cycles) — run after traversal when `detectionEnabled` (spec §4.11).
    pub fn strongly_connected_components(&self) -> Vec<Vec<String>> {
        let mut forward_adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            forward_adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        }

        let mut index_counter = 0usize;
        let mut indices: HashMap<&str, usize> = HashMap::new();
        let mut lowlink: HashMap<&str, usize> = HashMap::new();
        let mut on_stack: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut sccs: Vec<Vec<String>> = Vec::new();

        // Iterative Tarjan to avoid unbounded recursion on deep graphs.
        let start_nodes: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        for start in start_nodes {
            if indices.contains_key(start) {
                continue;
            }
            let mut work: Vec<(&str, usize)> = vec![(start, 0)];
            while let Some(&(v, child_idx)) = work.last() {
                if child_idx == 0 {
                    indices.insert(v, index_counter);
                    lowlink.insert(v, index_counter);
                    index_counter += 1;
                    stack.push(v);
                    on_stack.insert(v);
                }

                let neighbors = forward_adjacency.get(v).cloned().unwrap_or_default();
                if child_idx < neighbors.len() {
                    let w = neighbors[child_idx];
                    work.last_mut().unwrap().1 += 1;
                    if !indices.contains_key(w) {
                        work.push((w, 0));
                    } else if on_stack.contains(w) {
                        let wi = indices[w];
                        let vl = lowlink[v];
                        lowlink.insert(v, vl.min(wi));
                    }
                } else {
                    work.pop();
                    if let Some(&(parent, _)) = work.last() {
                        let vl = lowlink[v];
                        let pl = lowlink[parent];
                        lowlink.insert(parent, pl.min(vl));
                    }
                    if lowlink[v] == indices[v] {
                        let mut component = Vec::new();
                        loop {
                            let w = stack.pop().unwrap();
                            on_stack.remove(w);
                            component.push(w.to_string());
                            if w == v {
                                break;
                            }
                        }
                        if component.len() > 1 {
                            sccs.push(component);
                        }
                    }
                }
            }
        }

        sccs
    }

    /// Kahn's algorithm; stable (insertion order) among nodes with the same
    /// in-degree at any point, for deterministic assembler output.
    pub fn topological_sort(&self) -> Vec<String> {
        let mut in_degree: HashMap<&str, usize> = self.nodes.keys().map(|k| (k.as_str(), 0)).collect();
        for edge in &self.edges {
            if let Some(d) = in_degree.get_mut(edge.to.as_str()) {
                *d += 1;
            }
        }

        let mut ready: Vec<&str> = self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|uid| in_degree.get(uid).copied().unwrap_or(0) == 0)
            .collect();
        ready.sort();

        let mut forward_adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            forward_adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        }

        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut queue: std::collections::VecDeque<&str> = ready.into_iter().collect();
        while let Some(uid) = queue.pop_front() {
            ordered.push(uid.to_string());
            if let Some(children) = forward_adjacency.get(uid) {
                let mut next_ready = Vec::new();
                for &child in children {
                    if let Some(d) = in_degree.get_mut(child) {
                        *d -= 1;
                        if *d == 0 {
                            next_ready.push(child);
                        }
                    }
                }
                next_ready.sort();
                for child in next_ready {
                    queue.push_back(child);
                }
            }
        }
        ordered
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[ResourceEdge] {
        &self.edges
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::graph_model::Source;
    use discovery_core::schema::RefType;
    use discovery_core::{Gvk, Resource, Scope};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::api::DynamicObject;

    fn node(uid: &str) -> ResourceNode {
        let dynamic = DynamicObject {
            types: None,
            metadata: ObjectMeta { uid: Some(uid.into()), name: Some(uid.into()), ..Default::default() },
            data: serde_json::json!({}),
        };
        ResourceNode {
            uid: uid.to_string(),
            resource: Resource::from_dynamic(Gvk::new("", "v1", "Secret"), Scope::Namespaced, dynamic),
            depth: 0,
            discovery_path: vec![],
            source: Source::Transitive,
        }
    }

    fn edge(from: &str, to: &str) -> ResourceEdge {
        ResourceEdge::new(from.to_string(), to.to_string(), RefType::Custom, "spec.ref".into(), 0.9)
    }

    #[test]
    fn detects_cycle_and_continues() {
        let mut g = GraphBuilder::new(10);
        g.add_node(node("a"));
        g.add_node(node("b"));
        g.add_node(node("c"));
        g.add_edge(edge("a", "b"), CyclePolicy::Continue).unwrap();
        g.add_edge(edge("b", "c"), CyclePolicy::Continue).unwrap();
        let outcome = g.add_edge(edge("c", "a"), CyclePolicy::Continue).unwrap();
        assert!(matches!(outcome, AddEdgeOutcome::CycleContinue));
        assert_eq!(g.cycles().len(), 1);
        assert_eq!(g.edges().len(), 2);
    }

    #[test]
    fn fail_policy_errors_on_cycle() {
        let mut g = GraphBuilder::new(10);
        g.add_node(node("a"));
        g.add_node(node("b"));
        g.add_edge(edge("a", "b"), CyclePolicy::Fail).unwrap();
        assert!(g.add_edge(edge("b", "a"), CyclePolicy::Fail).is_err());
    }

    #[test]
    fn duplicate_edge_same_triple_is_idempotent() {
        let mut g = GraphBuilder::new(10);
        g.add_node(node("a"));
        g.add_node(node("b"));
        g.add_edge(edge("a", "b"), CyclePolicy::Continue).unwrap();
        g.add_edge(edge("a", "b"), CyclePolicy::Continue).unwrap();
        assert_eq!(g.edges().len(), 1);
    }

    #[test]
    fn topological_sort_orders_parents_before_children() {
        let mut g = GraphBuilder::new(10);
        g.add_node(node("a"));
        g.add_node(node("b"));
        g.add_node(node("c"));
        g.add_edge(edge("a", "b"), CyclePolicy::Continue).unwrap();
        g.add_edge(edge("b", "c"), CyclePolicy::Continue).unwrap();
        let order = g.topological_sort();
        let pos = |u: &str| order.iter().position(|x| x == u).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn scc_finds_true_cycle_component() {
        let mut g = GraphBuilder::new(10);
        g.add_node(node("a"));
        g.add_node(node("b"));
        g.add_node(node("c"));
        g.add_edge(edge("a", "b"), CyclePolicy::Stop).unwrap();
        g.add_edge(edge("b", "c"), CyclePolicy::Stop).unwrap();
        g.add_edge(edge("c", "a"), CyclePolicy::Stop).unwrap();
        let sccs = g.strongly_connected_components();
        assert!(sccs.iter().any(|c| c.len() == 3));
    }
}
