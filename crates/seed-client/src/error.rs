//! Seed client errors

use thiserror::Error;

/// Errors that can occur when talking to the seed API server
#[derive(Debug, Error)]
pub enum SeedError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// A required object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Certificate generation or parsing failed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// A bounded wait ran out
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A write carried a resourceVersion that is no longer current
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An object exists but is not in the shape we expect
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<rcgen::Error> for SeedError {
    fn from(e: rcgen::Error) -> Self {
        SeedError::Certificate(e.to_string())
    }
}

/// Whether a kube error is a 404
pub(crate) fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(api_err) if api_err.code == 404)
}
