use crate::ids::Gvk;
use crate::resource::Resource;
use crate::schema::RefType;
use serde::{Deserialize, Serialize};

/// Which phase/direction produced a node's first discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Direct,
    Label,
    Expression,
    Transitive,
}

/// One hop in a node's `discoveryPath` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryHop {
    pub field_path: String,
    pub target_gvk: Gvk,
}

/// A vertex of the discovered DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub uid: String,
    pub resource: Resource,
    /// Minimum number of edges from any seed node (BFS-guaranteed minimal).
    pub depth: usize,
    pub discovery_path: Vec<DiscoveryHop>,
    pub source: Source,
}

/// A directed edge, parent -> child.
///
/// Equality/hashing are keyed on `(from, to, field_path)` only, matching the
/// invariant in spec §3 ("no duplicate edges with the same (from, to,
/// fieldPath)") — `confidence` is an `f64` and is deliberately excluded so
/// the type can still live in a `HashSet`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEdge {
    pub from: String,
    pub to: String,
    pub ref_type: RefType,
    pub field_path: String,
    pub confidence: f64,
}

impl ResourceEdge {
    pub fn new(from: String, to: String, ref_type: RefType, field_path: String, confidence: f64) -> Self {
        Self {
            from,
            to,
            ref_type,
            field_path,
            confidence,
        }
    }

    pub fn dedup_key(&self) -> (String, String, String) {
        (self.from.clone(), self.to.clone(), self.field_path.clone())
    }
}

impl PartialEq for ResourceEdge {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from && self.to == other.to && self.field_path == other.field_path
    }
}

impl Eq for ResourceEdge {}

impl std::hash::Hash for ResourceEdge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.from.hash(state);
        self.to.hash(state);
        self.field_path.hash(state);
    }
}

/// A detected back-edge, recorded separately from the stored DAG (spec §3,
/// §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    /// uids, in traversal order, `path[0] == path[last]`'s target.
    pub nodes: Vec<String>,
    pub closing_edge: ResourceEdge,
}
