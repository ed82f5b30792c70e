//! ClusterClient trait for mocking
//!
//! Abstracts the Kubernetes calls the controller makes so reconciliation can be
//! unit tested against an in-memory cluster.

use crate::error::ClusterError;
use crds::WeblogicServer;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;

/// Kubernetes operations used by the WebLogic server controller.
///
/// Writes to a `WeblogicServer` are conditional on the `resourceVersion`
/// carried by the object passed in; a stale version yields
/// [`ClusterError::Conflict`].
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    // WeblogicServer (custom resource path)
    async fn get_server(&self, namespace: &str, name: &str) -> Result<WeblogicServer, ClusterError>;
    async fn replace_server(&self, server: &WeblogicServer) -> Result<WeblogicServer, ClusterError>;
    async fn replace_server_status(
        &self,
        server: &WeblogicServer,
    ) -> Result<WeblogicServer, ClusterError>;

    // Services
    async fn list_services(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Service>, ClusterError>;
    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClusterError>;
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    // StatefulSets
    async fn list_stateful_sets(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<StatefulSet>, ClusterError>;
    async fn create_stateful_set(
        &self,
        namespace: &str,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError>;
    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}
