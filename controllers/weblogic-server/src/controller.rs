//! Main controller implementation.
//!
//! The `Controller` starts one watcher task per resource kind and supervises
//! them until the process is asked to stop.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use cluster_client::KubeClusterClient;
use crds::WeblogicServer;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::Api;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for WeblogicServer management.
#[derive(Debug)]
pub struct Controller {
    server_watcher: JoinHandle<Result<(), ControllerError>>,
    workload_watcher: JoinHandle<Result<(), ControllerError>>,
    shutdown: watch::Sender<bool>,
}

impl Controller {
    /// Builds the reconciler and starts both watchers.
    pub fn new(client: KubeClusterClient, config: &ControllerConfig) -> Self {
        info!("Initializing WebLogic Server Controller");

        let kube_client = client.kube_client();
        let server_api: Api<WeblogicServer> =
            Api::namespaced(kube_client.clone(), &config.namespace);
        let workload_api: Api<StatefulSet> = Api::namespaced(kube_client, &config.namespace);

        let reconciler = Arc::new(Reconciler::new(Arc::new(client), config));
        let watcher = Arc::new(Watcher::new(
            reconciler,
            server_api,
            workload_api,
            config.resync_period,
        ));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let server_watcher = {
            let (watcher, rx) = (watcher.clone(), shutdown_rx.clone());
            tokio::spawn(async move { watcher.watch_servers(rx).await })
        };
        let workload_watcher =
            tokio::spawn(async move { watcher.watch_workloads(shutdown_rx).await });

        Self::from_tasks(server_watcher, workload_watcher, shutdown)
    }

    pub(crate) fn from_tasks(
        server_watcher: JoinHandle<Result<(), ControllerError>>,
        workload_watcher: JoinHandle<Result<(), ControllerError>>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            server_watcher,
            workload_watcher,
            shutdown,
        }
    }

    /// Runs until `signal` resolves or a watcher exits, then stops both watchers.
    ///
    /// The first watcher failure is returned after both have stopped.
    pub async fn run(mut self, signal: impl Future<Output = ()>) -> Result<(), ControllerError> {
        info!("WebLogic Server Controller running");

        let mut server_done = None;
        let mut workload_done = None;
        tokio::select! {
            _ = signal => info!("Shutdown signal received"),
            result = &mut self.server_watcher => {
                server_done = Some(flatten("WeblogicServer", result));
            }
            result = &mut self.workload_watcher => {
                workload_done = Some(flatten("StatefulSet", result));
            }
        }

        // receivers may already be gone if both watchers exited
        let _ = self.shutdown.send(true);

        let server_result = match server_done {
            Some(result) => result,
            None => flatten("WeblogicServer", self.server_watcher.await),
        };
        let workload_result = match workload_done {
            Some(result) => result,
            None => flatten("StatefulSet", self.workload_watcher.await),
        };
        info!("WebLogic Server Controller stopped");
        server_result.and(workload_result)
    }
}

fn flatten(
    kind: &str,
    joined: Result<Result<(), ControllerError>, tokio::task::JoinError>,
) -> Result<(), ControllerError> {
    let result = joined.map_err(ControllerError::from).and_then(|inner| inner);
    if let Err(e) = &result {
        error!("{} watcher failed: {}", kind, e);
    }
    result
}
