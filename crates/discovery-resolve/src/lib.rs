//! The real cluster reader, and the Phase-1/Phase-2 resolvers, scope
//! filter, and reference resolver built on it — spec §4.5-§4.8.

pub mod cluster;
pub mod direct;
pub mod kinds;
pub mod reference_resolver;
pub mod scope;
pub mod selector;

pub use cluster::KubeClusterReader;
pub use direct::DirectResolver;
pub use reference_resolver::{PendingFetch, ReferenceResolver};
pub use discovery_core::ScopeFilterConfig;
pub use scope::ScopeFilter;
pub use selector::{SelectorOutcome, SelectorResolver};
