//! Finds the dependents of a WeblogicServer, and the server owning a StatefulSet.
//!
//! Association is by the `server-label` ownership label only. The API server
//! filters by selector, and every candidate is checked again locally before it
//! is accepted.

use super::{Reconciler, namespace_of};
use crate::error::ControllerError;
use crds::{WeblogicServer, has_server_label, owning_server};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tracing::debug;

impl Reconciler {
    /// The Service owned by `server`, if one exists.
    pub async fn find_endpoint(
        &self,
        server: &WeblogicServer,
    ) -> Result<Option<Service>, ControllerError> {
        let name = server.name_any();
        let services = self
            .client
            .list_services(namespace_of(server), &server.label_selector())
            .await?;
        let found = services
            .into_iter()
            .find(|svc| has_server_label(svc.metadata.labels.as_ref(), &name));
        debug!(server = %name, found = found.is_some(), "Looked up Service");
        Ok(found)
    }

    /// The StatefulSet owned by `server`, if one exists.
    pub async fn find_workload(
        &self,
        server: &WeblogicServer,
    ) -> Result<Option<StatefulSet>, ControllerError> {
        let name = server.name_any();
        let stateful_sets = self
            .client
            .list_stateful_sets(namespace_of(server), &server.label_selector())
            .await?;
        let found = stateful_sets
            .into_iter()
            .find(|sts| has_server_label(sts.metadata.labels.as_ref(), &name));
        debug!(server = %name, found = found.is_some(), "Looked up StatefulSet");
        Ok(found)
    }

    /// Fetch the WeblogicServer named by the workload's ownership label.
    pub async fn find_server_for_workload(
        &self,
        workload: &StatefulSet,
    ) -> Result<WeblogicServer, ControllerError> {
        let owner = owning_server(workload.metadata.labels.as_ref())
            .ok_or_else(|| ControllerError::NotLabeled(workload.name_any()))?;
        let namespace = workload.metadata.namespace.as_deref().unwrap_or("default");
        Ok(self.client.get_server(namespace, owner).await?)
    }
}
