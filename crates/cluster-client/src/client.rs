//! Kubernetes-backed ClusterClient
//!
//! `WeblogicServer` goes through the custom resource endpoint, Services and
//! StatefulSets through the built-in core/v1 and apps/v1 endpoints.

use crate::error::ClusterError;
use crate::cluster_trait::ClusterClient;
use crds::WeblogicServer;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// ClusterClient talking to a real API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Wraps an already configured kube client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the in-cluster environment or local kubeconfig.
    pub async fn try_default() -> Result<Self, ClusterError> {
        Ok(Self::new(Client::try_default().await?))
    }

    /// Underlying kube client, for watchers.
    pub fn kube_client(&self) -> Client {
        self.client.clone()
    }

    fn servers(&self, namespace: &str) -> Api<WeblogicServer> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn stateful_sets(&self, namespace: &str) -> Api<StatefulSet> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn server_key(server: &WeblogicServer) -> Result<(String, String), ClusterError> {
    let name = server
        .metadata
        .name
        .clone()
        .ok_or_else(|| ClusterError::InvalidObject("WeblogicServer has no name".to_string()))?;
    let namespace = server.namespace().unwrap_or_else(|| "default".to_string());
    Ok((namespace, name))
}

#[async_trait::async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_server(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<WeblogicServer, ClusterError> {
        Ok(self.servers(namespace).get(name).await?)
    }

    async fn replace_server(
        &self,
        server: &WeblogicServer,
    ) -> Result<WeblogicServer, ClusterError> {
        let (namespace, name) = server_key(server)?;
        debug!("Replacing WeblogicServer {}/{}", namespace, name);
        Ok(self
            .servers(&namespace)
            .replace(&name, &PostParams::default(), server)
            .await?)
    }

    async fn replace_server_status(
        &self,
        server: &WeblogicServer,
    ) -> Result<WeblogicServer, ClusterError> {
        let (namespace, name) = server_key(server)?;
        // resourceVersion in the patch body makes the API server reject stale writes with 409
        let status_patch = serde_json::json!({
            "metadata": { "resourceVersion": server.resource_version() },
            "status": server.status,
        });
        debug!("Updating WeblogicServer {}/{} status", namespace, name);
        Ok(self
            .servers(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await?)
    }

    async fn list_services(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Service>, ClusterError> {
        let lp = ListParams::default().labels(label_selector);
        Ok(self.services(namespace).list(&lp).await?.items)
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClusterError> {
        Ok(self
            .services(namespace)
            .create(&PostParams::default(), service)
            .await?)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.services(namespace)
            .delete(name, &DeleteParams::background())
            .await?;
        Ok(())
    }

    async fn list_stateful_sets(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<StatefulSet>, ClusterError> {
        let lp = ListParams::default().labels(label_selector);
        Ok(self.stateful_sets(namespace).list(&lp).await?.items)
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError> {
        Ok(self
            .stateful_sets(namespace)
            .create(&PostParams::default(), stateful_set)
            .await?)
    }

    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.stateful_sets(namespace)
            .delete(name, &DeleteParams::background())
            .await?;
        Ok(())
    }
}
