//! Status state machine for WeblogicServer.
//!
//! Phase transitions come from StatefulSet observations or from failed
//! reconciliation steps. `status.errors` is append-only and a message equal to
//! the most recent entry is not appended again.
//!
//! [`StatusWriter`] is the only writer of `status`. Writes for one server are
//! serialized in-process and retried on version conflicts with a re-fetch.

use crate::backoff::FibonacciBackoff;
use crate::error::ControllerError;
use cluster_client::ClusterClient;
use crds::{ServerPhase, WeblogicServer};
use kube::ResourceExt;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Phase implied by a StatefulSet's desired and ready replica counts.
///
/// More ready replicas than desired (a scale-down in progress) implies nothing.
pub fn phase_for_replicas(desired: i32, ready: i32) -> Option<ServerPhase> {
    match ready.cmp(&desired) {
        Ordering::Less => Some(ServerPhase::Pending),
        Ordering::Equal => Some(ServerPhase::Running),
        Ordering::Greater => None,
    }
}

/// Apply a phase and optional error to `server` in memory.
///
/// Returns false when nothing changed and no write is needed. An empty error
/// log always needs a write, so `errors` lands on the stored object.
pub fn apply_state(server: &mut WeblogicServer, phase: ServerPhase, error: Option<&str>) -> bool {
    let (current_phase, last_error) = match &server.status {
        Some(status) => (status.phase, status.errors.last().map(String::as_str)),
        None => (ServerPhase::default(), None),
    };
    let unchanged = phase == current_phase
        && match error {
            None => last_error.is_some(),
            Some(message) => last_error == Some(message),
        };
    if unchanged {
        return false;
    }

    let status = server.status.get_or_insert_with(Default::default);
    status.phase = phase;
    if let Some(message) = error {
        if status.errors.last().map(String::as_str) != Some(message) {
            status.errors.push(message.to_string());
        }
    }
    true
}

/// Lock map key for a server.
pub(crate) fn server_key(server: &WeblogicServer) -> String {
    format!("{}/{}", super::namespace_of(server), server.name_any())
}

/// Persists status changes with per-server serialization and conflict retry.
pub struct StatusWriter {
    client: Arc<dyn ClusterClient>,
    max_attempts: u32,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl std::fmt::Debug for StatusWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusWriter")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl StatusWriter {
    pub fn new(client: Arc<dyn ClusterClient>, max_attempts: u32) -> Self {
        Self {
            client,
            max_attempts: max_attempts.max(1),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts per conditional write before a conflict is returned.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Take the write lock for the server stored under `key`.
    pub(crate) async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry of a deleted server unless a writer still holds it.
    pub(crate) fn forget(&self, key: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked(&self, key: &str) -> bool {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(key)
    }

    /// Set the server's phase and optionally log an error, then persist.
    ///
    /// Skips the write when neither the phase nor a non-empty error log would change.
    pub async fn set_state(
        &self,
        server: &WeblogicServer,
        phase: ServerPhase,
        error: Option<&str>,
    ) -> Result<(), ControllerError> {
        let key = server_key(server);
        let _guard = self.lock(&key).await;

        let namespace = super::namespace_of(server).to_string();
        let name = server.name_any();
        let mut current = server.clone();
        let mut backoff = FibonacciBackoff::default();
        let mut attempt = 1;
        loop {
            if !apply_state(&mut current, phase, error) {
                debug!(
                    server = %name, namespace = %namespace, phase = %phase,
                    "Status unchanged, skipping write"
                );
                return Ok(());
            }
            match self.client.replace_server_status(&current).await {
                Ok(_) => {
                    info!(server = %name, namespace = %namespace, phase = %phase, "Updated status");
                    return Ok(());
                }
                Err(e) if e.is_conflict() && attempt < self.max_attempts => {
                    let delay = backoff.next_backoff();
                    warn!(
                        server = %name, namespace = %namespace, attempt,
                        "Status write conflicted, retrying in {:?}", delay
                    );
                    tokio::time::sleep(delay).await;
                    current = self.client.get_server(&namespace, &name).await?;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
