use serde::{Deserialize, Serialize};

/// Per-resource outcome of a single fetch (spec §4.5, §7). Unlike
/// `DiscoveryError`, a `FetchStatus` never aborts the invocation — it is
/// attached to the resource's own slot in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchStatus {
    Success,
    NotFound,
    Forbidden,
    Timeout,
    /// Non-fatal: the referenced object could not be resolved to a concrete
    /// GVR (e.g. a bare `v1alpha1` last-resort guess that does not exist).
    SchemaUnavailable,
    Error(String),
}

impl FetchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchStatus::Success)
    }
}

/// Why Phase 3 stopped expanding the graph (spec §4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Completed,
    DepthLimit,
    ResourceLimit,
    TimeLimit,
    Cancelled,
    /// `onCycleDetected: fail` — the invocation is terminal in this case, so
    /// in practice this reason is only ever attached to an error, never a
    /// successful `DiscoveryGraph`. Kept as its own variant (SPEC_FULL's
    /// supplemented-features note) so the reason the traversal aborted is
    /// still representable in the type rather than inferred from an absence.
    CycleFail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status_is_success() {
        assert!(FetchStatus::Success.is_success());
        assert!(!FetchStatus::NotFound.is_success());
    }
}
