//! Kubernetes resource watchers.
//!
//! Each watched kind runs its own stream. Raw watcher events are folded into a
//! [`SnapshotStore`] and the resulting typed events are handed to the
//! reconciler one at a time, in delivery order.

use crate::error::ControllerError;
use crate::events::{ResourceEvent, SnapshotStore};
use crate::reconciler::Reconciler;
use crds::{SERVER_LABEL, WeblogicServer};
use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::{Api, Resource};
use kube_runtime::{WatchStreamExt, watcher};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Watches WeblogicServers and StatefulSets and feeds the reconciler.
#[derive(Debug)]
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    server_api: Api<WeblogicServer>,
    workload_api: Api<StatefulSet>,
    resync_period: Option<Duration>,
}

impl Watcher {
    pub fn new(
        reconciler: Arc<Reconciler>,
        server_api: Api<WeblogicServer>,
        workload_api: Api<StatefulSet>,
        resync_period: Option<Duration>,
    ) -> Self {
        Self {
            reconciler,
            server_api,
            workload_api,
            resync_period,
        }
    }

    /// Watch WeblogicServer resources until shutdown.
    pub async fn watch_servers(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ControllerError> {
        info!("Starting WeblogicServer watcher");
        let stream = watcher(self.server_api.clone(), watcher::Config::default()).default_backoff();
        let reconciler: &Reconciler = &self.reconciler;
        run_event_stream("WeblogicServer", stream, self.resync_period, shutdown, move |event| {
            reconciler.handle_server_event(event)
        })
        .await
    }

    /// Watch StatefulSets carrying the ownership label until shutdown.
    pub async fn watch_workloads(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ControllerError> {
        info!("Starting StatefulSet watcher");
        let config = watcher::Config::default().labels(SERVER_LABEL);
        let stream = watcher(self.workload_api.clone(), config).default_backoff();
        let reconciler: &Reconciler = &self.reconciler;
        run_event_stream("StatefulSet", stream, self.resync_period, shutdown, move |event| {
            reconciler.handle_workload_event(event)
        })
        .await
    }
}

/// Dispatch typed events from `stream` to `handler` until `shutdown` flips.
///
/// A `resync_period` replays every known object as an update with identical
/// old and new snapshots. The end of the stream is an error: a watcher is
/// expected to run until it is told to stop.
pub async fn run_event_stream<K, S, H, Fut>(
    kind: &'static str,
    stream: S,
    resync_period: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
    handler: H,
) -> Result<(), ControllerError>
where
    K: Resource + Clone,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
    H: Fn(ResourceEvent<K>) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut stream = std::pin::pin!(stream);
    let mut store = SnapshotStore::new();
    let mut resync = resync_period.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        if *shutdown.borrow() {
            info!("{} watcher stopping", kind);
            return Ok(());
        }
        let events = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // sender gone: nobody can signal shutdown any more
                    info!("{} watcher stopping, shutdown channel closed", kind);
                    return Ok(());
                }
                continue;
            }
            _ = next_tick(&mut resync) => {
                debug!("{} resync of {} objects", kind, store.len());
                store.resync()
            }
            next = stream.next() => match next {
                Some(Ok(event)) => {
                    if matches!(event, watcher::Event::InitDone) {
                        debug!("{} watcher initialization complete", kind);
                    }
                    store.apply(event)
                }
                Some(Err(e)) => {
                    warn!("{} watch error: {}", kind, e);
                    continue;
                }
                None => {
                    return Err(ControllerError::Watch(format!("{} watch stream ended", kind)));
                }
            },
        };

        for event in events {
            if *shutdown.borrow() {
                break;
            }
            handler(event).await;
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
