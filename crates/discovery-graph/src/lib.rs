pub mod batch;
pub mod cache;
pub mod graph;
pub mod traversal;

pub use batch::{BatchItemOutcome, BatchPlanner};
pub use cache::{CacheHitStats, ExecutionCache, ResourceKey};
pub use graph::{AddEdgeOutcome, GraphBuilder};
pub use traversal::{TraversalEngine, TraversalOutput, TraversalStats};
