//! Controller-specific error types.
//!
//! Every reconciliation step returns one of these to the reconciler, which
//! decides whether it becomes a `Failed` status entry or a logged, dropped
//! event. The `Display` output is what lands in `status.errors`.

use cluster_client::ClusterError;
use crds::ValidationError;
use thiserror::Error;

/// Errors that can occur in the WebLogic server controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The WeblogicServer spec is malformed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A dependent resource expected to exist is absent
    #[error("{kind} for server {server} not found")]
    NotFound { kind: &'static str, server: String },

    /// A StatefulSet carries no ownership label
    #[error("StatefulSet {0} has no server-label; not part of a WeblogicServer")]
    NotLabeled(String),

    /// Kubernetes API call failed
    #[error("{0}")]
    Cluster(#[from] ClusterError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// A watcher task panicked or was cancelled
    #[error("Watcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ControllerError {
    /// True when the addressed object (dependent or server) does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            ControllerError::NotFound { .. } => true,
            ControllerError::Cluster(e) => e.is_not_found(),
            _ => false,
        }
    }
}
