//! Create and delete the Service and StatefulSet owned by a WeblogicServer.
//!
//! Creation is find-or-create, so repeated calls for the same server leave a
//! single dependent of each kind.

use super::{Reconciler, namespace_of};
use crate::error::ControllerError;
use crate::resources::{service_for_server, stateful_set_for_server};
use cluster_client::ClusterError;
use crds::WeblogicServer;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tracing::info;

impl Reconciler {
    /// Return the server's Service, creating it if absent.
    pub async fn ensure_endpoint(
        &self,
        server: &WeblogicServer,
    ) -> Result<Service, ControllerError> {
        if let Some(existing) = self.find_endpoint(server).await? {
            return Ok(existing);
        }
        let namespace = namespace_of(server);
        let created = self
            .client
            .create_service(namespace, &service_for_server(server))
            .await?;
        info!(
            server = %server.name_any(), namespace = %namespace,
            "Created Service {}", created.name_any()
        );
        Ok(created)
    }

    /// Return the server's StatefulSet, creating it behind `endpoint` if absent.
    pub async fn ensure_workload(
        &self,
        server: &WeblogicServer,
        endpoint: &Service,
    ) -> Result<StatefulSet, ControllerError> {
        if let Some(existing) = self.find_workload(server).await? {
            return Ok(existing);
        }
        let namespace = namespace_of(server);
        let template = stateful_set_for_server(server, &endpoint.name_any(), &self.image)
            .map_err(ClusterError::from)?;
        let created = self.client.create_stateful_set(namespace, &template).await?;
        info!(
            server = %server.name_any(), namespace = %namespace,
            "Created StatefulSet {}", created.name_any()
        );
        Ok(created)
    }

    /// Delete the server's StatefulSet. Absent is an error.
    pub async fn teardown_workload(&self, server: &WeblogicServer) -> Result<(), ControllerError> {
        let workload = self
            .find_workload(server)
            .await?
            .ok_or_else(|| ControllerError::NotFound {
                kind: "StatefulSet",
                server: server.name_any(),
            })?;
        let namespace = namespace_of(server);
        self.client
            .delete_stateful_set(namespace, &workload.name_any())
            .await?;
        info!(
            server = %server.name_any(), namespace = %namespace,
            "Deleted StatefulSet {}", workload.name_any()
        );
        Ok(())
    }

    /// Delete the server's Service. Absent is an error.
    pub async fn teardown_endpoint(&self, server: &WeblogicServer) -> Result<(), ControllerError> {
        let endpoint = self
            .find_endpoint(server)
            .await?
            .ok_or_else(|| ControllerError::NotFound {
                kind: "Service",
                server: server.name_any(),
            })?;
        let namespace = namespace_of(server);
        self.client
            .delete_service(namespace, &endpoint.name_any())
            .await?;
        info!(
            server = %server.name_any(), namespace = %namespace,
            "Deleted Service {}", endpoint.name_any()
        );
        Ok(())
    }
}
