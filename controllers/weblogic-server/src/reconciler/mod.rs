//! Reconciliation logic for WeblogicServer resources.
//!
//! - `locator`: finds dependents by ownership label
//! - `lifecycle`: find-or-create and teardown of the Service and StatefulSet
//! - `status`: phase and error log on `status`

pub mod lifecycle;
pub mod locator;
pub mod status;

#[cfg(test)]
mod reconciler_test;

use crate::backoff::FibonacciBackoff;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::{ResourceEvent, ServerEvent, WorkloadEvent};
use cluster_client::ClusterClient;
use crds::{ServerPhase, WeblogicServer};
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::ResourceExt;
use status::{StatusWriter, phase_for_replicas, server_key};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Namespace of a resource, falling back to `default`.
pub(crate) fn namespace_of(server: &WeblogicServer) -> &str {
    server.metadata.namespace.as_deref().unwrap_or("default")
}

/// Reconciles WeblogicServers and the StatefulSets they own.
pub struct Reconciler {
    pub(crate) client: Arc<dyn ClusterClient>,
    pub(crate) status: StatusWriter,
    pub(crate) image: String,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("status", &self.status)
            .field("image", &self.image)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(client: Arc<dyn ClusterClient>, config: &ControllerConfig) -> Self {
        Self {
            status: StatusWriter::new(client.clone(), config.status_update_max_retries),
            client,
            image: config.image.clone(),
        }
    }

    /// Handle one WeblogicServer event. Errors are logged, never returned.
    pub async fn handle_server_event(&self, event: ServerEvent) {
        if event.is_resync() {
            debug!(
                server = %event.object().name_any(),
                "Resync of unchanged WeblogicServer, nothing to do"
            );
            return;
        }
        match event {
            ResourceEvent::Added(server) => {
                info!(
                    server = %server.name_any(), namespace = %namespace_of(&server),
                    "WeblogicServer added"
                );
                if let Err(e) = self.reconcile_create(&server).await {
                    debug!(server = %server.name_any(), "Create reconcile ended with error: {}", e);
                }
            }
            ResourceEvent::Updated { new, .. } => {
                info!(
                    server = %new.name_any(), namespace = %namespace_of(&new),
                    "WeblogicServer updated"
                );
                if let Err(e) = self.reconcile_create(&new).await {
                    debug!(server = %new.name_any(), "Update reconcile ended with error: {}", e);
                }
            }
            ResourceEvent::Deleted(server) => {
                info!(
                    server = %server.name_any(), namespace = %namespace_of(&server),
                    "WeblogicServer deleted"
                );
                if let Err(e) = self.reconcile_delete(&server).await {
                    debug!(server = %server.name_any(), "Delete reconcile ended with error: {}", e);
                }
            }
        }
    }

    /// Handle one StatefulSet event. Every variant re-evaluates the owner's phase.
    pub async fn handle_workload_event(&self, event: WorkloadEvent) {
        let workload = event.object();
        if let Err(e) = self.reconcile_workload(workload).await {
            match &e {
                ControllerError::NotLabeled(_) => warn!("Dropping StatefulSet event: {}", e),
                e if e.is_not_found() => {
                    warn!(
                        statefulset = %workload.name_any(),
                        "Dropping StatefulSet event, owner not found: {}", e
                    )
                }
                _ => error!(
                    statefulset = %workload.name_any(),
                    "Failed to reconcile StatefulSet: {}", e
                ),
            }
        }
    }

    /// Drive the server's dependents toward its spec.
    ///
    /// A server without its ownership label only gets the label this cycle;
    /// the resulting update event finishes the job.
    pub async fn reconcile_create(&self, server: &WeblogicServer) -> Result<(), ControllerError> {
        let mut server = server.clone();
        server.ensure_defaults();
        let name = server.name_any();

        if let Err(e) = server.validate() {
            let err = ControllerError::from(e);
            error!(server = %name, "Invalid WeblogicServer: {}", err);
            self.mark_failed(&server, &err).await;
            return Err(err);
        }

        if !server.has_server_label() {
            if let Err(err) = self.insert_label(&server).await {
                error!(server = %name, "Failed to label WeblogicServer: {}", err);
                self.mark_failed(&server, &err).await;
                return Err(err);
            }
            return Ok(());
        }

        let result = match self.ensure_endpoint(&server).await {
            Ok(endpoint) => self.ensure_workload(&server, &endpoint).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(err) = result {
            error!(server = %name, "Failed to reconcile WeblogicServer: {}", err);
            self.mark_failed(&server, &err).await;
            return Err(err);
        }
        debug!(server = %name, "WeblogicServer reconciled");
        Ok(())
    }

    /// Remove a deleted server's StatefulSet, then its Service.
    pub async fn reconcile_delete(&self, server: &WeblogicServer) -> Result<(), ControllerError> {
        let mut server = server.clone();
        server.ensure_defaults();
        let name = server.name_any();

        let result = match server.validate() {
            Ok(()) => match self.teardown_workload(&server).await {
                Ok(()) => self.teardown_endpoint(&server).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e.into()),
        };
        if let Err(err) = &result {
            error!(server = %name, "Failed to tear down WeblogicServer: {}", err);
            self.mark_failed(&server, err).await;
        }
        self.status.forget(&server_key(&server));
        result
    }

    /// Set the owner's phase from the StatefulSet's replica counts.
    pub async fn reconcile_workload(&self, workload: &StatefulSet) -> Result<(), ControllerError> {
        let server = self.find_server_for_workload(workload).await?;
        let desired = workload
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let ready = workload
            .status
            .as_ref()
            .and_then(|status| status.ready_replicas)
            .unwrap_or(0);

        match phase_for_replicas(desired, ready) {
            Some(phase) => {
                debug!(
                    server = %server.name_any(), desired, ready, phase = %phase,
                    "Observed StatefulSet"
                );
                self.status.set_state(&server, phase, None).await
            }
            None => {
                debug!(
                    server = %server.name_any(), desired, ready,
                    "More replicas ready than desired, phase unchanged"
                );
                Ok(())
            }
        }
    }

    /// Persist the ownership label (and any defaults) on the server.
    async fn insert_label(&self, server: &WeblogicServer) -> Result<(), ControllerError> {
        let key = server_key(server);
        let _guard = self.status.lock(&key).await;

        let namespace = namespace_of(server).to_string();
        let name = server.name_any();
        let mut current = server.clone();
        current.insert_server_label();
        let mut backoff = FibonacciBackoff::default();
        let mut attempt = 1;
        loop {
            match self.client.replace_server(&current).await {
                Ok(_) => {
                    info!(server = %name, namespace = %namespace, "Added ownership label");
                    return Ok(());
                }
                Err(e) if e.is_conflict() && attempt < self.status.max_attempts() => {
                    let delay = backoff.next_backoff();
                    warn!(
                        server = %name, attempt,
                        "Label write conflicted, retrying in {:?}", delay
                    );
                    tokio::time::sleep(delay).await;
                    current = self.client.get_server(&namespace, &name).await?;
                    current.ensure_defaults();
                    if !current.insert_server_label() {
                        return Ok(());
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Best-effort `Failed` status write; a failure here is only logged.
    async fn mark_failed(&self, server: &WeblogicServer, err: &ControllerError) {
        let message = err.to_string();
        if let Err(e) = self
            .status
            .set_state(server, ServerPhase::Failed, Some(&message))
            .await
        {
            warn!(server = %server.name_any(), "Could not record failure on status: {}", e);
        }
    }
}
