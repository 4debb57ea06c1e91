//! Error types for the reconciliation engine
//!
//! The engine's functions are total over well-formed input. Errors surface
//! only when a request names records that must already exist, when a
//! feature fails ingestion checks, or when a snapshot cannot be decoded. In
//! every case the caller's snapshot is left untouched.

use planlog_model::{Identity, ModelError};

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Request references records that cannot be resolved
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Feature failed ingestion checks
    #[error("invalid feature: {0}")]
    Model(#[from] ModelError),

    /// Snapshot could not be encoded or decoded
    #[error("snapshot codec failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl EngineError {
    /// Check if error is a request validation failure
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Unresolvable request targets
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Move requested without a destination scenario
    #[error("move requires a destination scenario")]
    MissingDestination,

    /// Scenario does not exist
    #[error("scenario not found: {0}")]
    ScenarioNotFound(Identity),

    /// Layer does not exist
    #[error("layer not found: {0}")]
    LayerNotFound(Identity),

    /// Feature edit targets a scenario identity
    #[error("{0} is a scenario, not a layer")]
    NotALayer(Identity),

    /// Identity already used by another record
    #[error("identity already in use: {0}")]
    DuplicateIdentity(Identity),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display() {
        let err = EngineError::from(ValidationError::MissingDestination);
        assert!(err.to_string().contains("destination scenario"));
        assert!(err.is_validation());
    }

    #[test]
    fn model_errors_are_not_validation() {
        let err = EngineError::from(ModelError::EmptyGeometry);
        assert!(!err.is_validation());
    }
}
