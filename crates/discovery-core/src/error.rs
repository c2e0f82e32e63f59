use thiserror::Error;

/// Invocation-terminal errors. Anything that reaches here aborts the whole
/// `discover()` call and no partial graph is returned (spec §7:
/// "only invocation-wide conditions ... propagate as a terminal response").
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid label selector: {0}")]
    InvalidSelector(String),

    #[error("invalid field expression: {0}")]
    InvalidExpression(String),

    #[error("invalid label value: {0}")]
    InvalidLabelValue(String),

    #[error("invalid label key: {0}")]
    InvalidLabelKey(String),

    #[error("unsupported match type: {0}")]
    UnsupportedMatchType(String),

    #[error("cycle detected and onCycleDetected=fail: {0}")]
    CycleDetected(String),

    #[error("constraint violation: found {found}, required {required}")]
    ConstraintViolation { found: usize, required: usize },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
