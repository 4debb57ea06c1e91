//! Error types for remote operations
//!
//! Every remote failure leaves the caller's snapshot untouched, so any
//! error here can be retried by running the same operation again.

use planlog_engine::EngineError;
use planlog_model::Identity;

/// Main remote error type
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Transport failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Service answered with an error body
    #[error("service error {code}: {message}")]
    Service {
        /// Service error code
        code: i64,
        /// Service message
        message: String,
    },

    /// Response could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Local reconciliation failed
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Terrain could not be sampled
    #[error("terrain sampling failed: {0}")]
    Terrain(String),

    /// Record has no remote counterpart yet
    #[error("{0} has not been published")]
    NotPublished(Identity),

    /// Retried operation kept failing
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Last failure
        last: Box<RemoteError>,
    },
}

impl RemoteError {
    /// Create a service error
    #[inline]
    pub fn service(code: i64, message: impl Into<String>) -> Self {
        Self::Service {
            code,
            message: message.into(),
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Terrain(_) => true,
            Self::Service { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

impl From<toml::de::Error> for RemoteError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
