//! Cluster client for the WebLogic server controller
//!
//! The [`ClusterClient`] trait covers every Kubernetes call the controller
//! makes: get/replace on `WeblogicServer`, and list/create/delete on the
//! Services and StatefulSets a server owns. [`KubeClusterClient`] is the real
//! implementation; [`MockClusterClient`] (feature `test-util`) is an in-memory
//! cluster for unit tests.

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeClusterClient;
pub use cluster_trait::ClusterClient;
pub use error::ClusterError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockClusterClient;
