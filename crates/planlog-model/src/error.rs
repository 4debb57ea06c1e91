//! Error types for the edit log model

/// Errors raised while building or validating model values
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Identity key is empty
    #[error("identity must not be empty")]
    EmptyIdentity,

    /// Reserved attribute carries a value of the wrong kind
    #[error("attribute '{key}' must be {expected}, got {actual}")]
    InvalidAttribute {
        key: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// Identity attribute disagrees with the feature identity
    #[error("identity attribute '{attribute}' does not match feature identity '{identity}'")]
    IdentityMismatch { identity: String, attribute: String },

    /// Geometry has no usable coordinates
    #[error("geometry is empty")]
    EmptyGeometry,

    /// Color string could not be parsed
    #[error("invalid color: {0}")]
    InvalidColor(String),
}
