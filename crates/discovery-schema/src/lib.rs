//! Reference field detection (C1) and the embedded/dynamic/hybrid
//! Schema Registry (C2) — spec §4.1/§4.2.

pub mod detector;
pub mod dynamic;
pub mod embedded;
pub mod registry;

pub use detector::ReferenceDetector;
pub use registry::{HybridRegistry, SchemaRegistry};
