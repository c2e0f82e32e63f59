//! Label-specific error taxonomy (spec §4.3/§4.4), kept distinct from
//! `discovery_core::DiscoveryError`'s field-expression kinds so a bad label
//! key/value is never reported as an "invalid field expression".

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("InvalidLabelValue: {0}")]
    InvalidLabelValue(String),

    #[error("InvalidLabelKey: {0}")]
    InvalidLabelKey(String),

    #[error("invalid transform: {0}")]
    InvalidTransform(String),
}

impl From<LabelError> for discovery_core::DiscoveryError {
    fn from(err: LabelError) -> Self {
        match err {
            LabelError::InvalidLabelValue(msg) => discovery_core::DiscoveryError::InvalidLabelValue(msg),
            LabelError::InvalidLabelKey(msg) => discovery_core::DiscoveryError::InvalidLabelKey(msg),
            LabelError::InvalidTransform(msg) => discovery_core::DiscoveryError::InvalidExpression(msg),
        }
    }
}
