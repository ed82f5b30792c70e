//! Cluster client errors

use thiserror::Error;

/// Errors returned by [`crate::ClusterClient`] operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The addressed object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency check failed (stale resourceVersion)
    #[error("conflict: {0}")]
    Conflict(String),

    /// The API server rejected the request
    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    /// Transport or client-side failure
    #[error("Kubernetes client error: {0}")]
    Kube(kube::Error),

    /// Object could not be encoded for the request
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object is missing metadata the request needs
    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict(_))
    }
}

impl From<kube::Error> for ClusterError {
    fn from(error: kube::Error) -> Self {
        match &error {
            kube::Error::Api(response) if response.code == 404 => {
                ClusterError::NotFound(response.message.clone())
            }
            kube::Error::Api(response) if response.code == 409 => {
                ClusterError::Conflict(response.message.clone())
            }
            kube::Error::Api(response) => ClusterError::Api {
                code: response.code,
                message: response.message.clone(),
            },
            _ => ClusterError::Kube(error),
        }
    }
}
