//! Mock ClusterClient for unit testing
//!
//! Keeps servers, Services and StatefulSets in memory, hands out increasing
//! resource versions, and rejects writes carrying a stale version the way the
//! API server does. Every call is recorded so tests can assert on API traffic.

use crate::cluster_trait::ClusterClient;
use crate::error::ClusterError;
use crds::WeblogicServer;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Key = (String, String);

/// Mock ClusterClient for testing
#[derive(Clone, Default)]
pub struct MockClusterClient {
    servers: Arc<Mutex<BTreeMap<Key, WeblogicServer>>>,
    services: Arc<Mutex<BTreeMap<Key, Service>>>,
    stateful_sets: Arc<Mutex<BTreeMap<Key, StatefulSet>>>,
    next_version: Arc<Mutex<u64>>,
    calls: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashMap<&'static str, VecDeque<ClusterError>>>>,
    ignore_selectors: Arc<AtomicBool>,
}

impl std::fmt::Debug for MockClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClusterClient")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl MockClusterClient {
    /// Create an empty mock cluster
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_version(&self) -> String {
        let mut version = self.next_version.lock().unwrap();
        *version += 1;
        version.to_string()
    }

    fn record(&self, op: &str, namespace: &str, name: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}/{}", op, namespace, name));
    }

    fn injected_failure(&self, op: &'static str) -> Option<ClusterError> {
        self.failures
            .lock()
            .unwrap()
            .get_mut(op)
            .and_then(VecDeque::pop_front)
    }

    fn stamp(&self, meta: &mut ObjectMeta, namespace: &str) {
        meta.namespace = Some(namespace.to_string());
        meta.resource_version = Some(self.bump_version());
    }

    /// Make the next call to `op` (trait method name) fail with `error`.
    /// Multiple failures for the same operation are returned in order.
    pub fn fail_next(&self, op: &'static str, error: ClusterError) {
        self.failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// When set, list calls return every object in the namespace regardless of
    /// the label selector.
    pub fn set_ignore_selectors(&self, ignore: bool) {
        self.ignore_selectors.store(ignore, Ordering::SeqCst);
    }

    /// All calls made so far, as `"<op> <namespace>/<name-or-selector>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Number of recorded calls to `op`.
    pub fn call_count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.split(' ').next() == Some(op))
            .count()
    }

    /// Store a server (for test setup). Returns it with a fresh resource version.
    pub fn add_server(&self, mut server: WeblogicServer) -> WeblogicServer {
        let namespace = server.metadata.namespace.clone().unwrap_or_else(|| "default".to_string());
        let name = server.metadata.name.clone().unwrap_or_default();
        self.stamp(&mut server.metadata, &namespace);
        self.servers
            .lock()
            .unwrap()
            .insert((namespace, name), server.clone());
        server
    }

    /// Simulate a write by another party: bumps the stored resource version.
    pub fn touch_server(&self, namespace: &str, name: &str) {
        let version = self.bump_version();
        if let Some(server) = self
            .servers
            .lock()
            .unwrap()
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            server.metadata.resource_version = Some(version);
        }
    }

    /// Remove a server (simulates deletion by the user).
    pub fn remove_server(&self, namespace: &str, name: &str) -> Option<WeblogicServer> {
        self.servers
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
    }

    /// Current stored copy of a server.
    pub fn server(&self, namespace: &str, name: &str) -> Option<WeblogicServer> {
        self.servers
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Store a Service (for test setup).
    pub fn add_service(&self, mut service: Service) -> Service {
        let namespace = service.metadata.namespace.clone().unwrap_or_else(|| "default".to_string());
        let name = service.metadata.name.clone().unwrap_or_default();
        self.stamp(&mut service.metadata, &namespace);
        self.services
            .lock()
            .unwrap()
            .insert((namespace, name), service.clone());
        service
    }

    /// All Services in a namespace.
    pub fn services(&self, namespace: &str) -> Vec<Service> {
        self.services
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, svc)| svc.clone())
            .collect()
    }

    /// Store a StatefulSet (for test setup).
    pub fn add_stateful_set(&self, mut stateful_set: StatefulSet) -> StatefulSet {
        let namespace = stateful_set
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let name = stateful_set.metadata.name.clone().unwrap_or_default();
        self.stamp(&mut stateful_set.metadata, &namespace);
        self.stateful_sets
            .lock()
            .unwrap()
            .insert((namespace, name), stateful_set.clone());
        stateful_set
    }

    /// All StatefulSets in a namespace.
    pub fn stateful_sets(&self, namespace: &str) -> Vec<StatefulSet> {
        self.stateful_sets
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, sts)| sts.clone())
            .collect()
    }

    fn select<T: Clone>(
        &self,
        store: &Mutex<BTreeMap<Key, T>>,
        namespace: &str,
        label_selector: &str,
        labels_of: impl Fn(&T) -> Option<&BTreeMap<String, String>>,
    ) -> Vec<T> {
        let ignore = self.ignore_selectors.load(Ordering::SeqCst);
        store
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .filter(|(_, obj)| ignore || matches_selector(labels_of(obj), label_selector))
            .map(|(_, obj)| obj.clone())
            .collect()
    }
}

/// Equality (`k=v`) and existence (`k`) terms joined by commas.
fn matches_selector(labels: Option<&BTreeMap<String, String>>, selector: &str) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.and_then(|l| l.get(key)).is_some_and(|v| v == value),
            None => labels.is_some_and(|l| l.contains_key(term)),
        })
}

fn key_of(meta: &ObjectMeta, fallback_namespace: &str) -> Result<Key, ClusterError> {
    let name = meta
        .name
        .clone()
        .ok_or_else(|| ClusterError::InvalidObject("object has no name".to_string()))?;
    let namespace = meta
        .namespace
        .clone()
        .unwrap_or_else(|| fallback_namespace.to_string());
    Ok((namespace, name))
}

fn check_version(stored: &ObjectMeta, incoming: &ObjectMeta) -> Result<(), ClusterError> {
    match (&stored.resource_version, &incoming.resource_version) {
        (Some(current), Some(given)) if current != given => Err(ClusterError::Conflict(format!(
            "the object has been modified (resourceVersion {} != {})",
            given, current
        ))),
        _ => Ok(()),
    }
}

#[async_trait::async_trait]
impl ClusterClient for MockClusterClient {
    async fn get_server(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<WeblogicServer, ClusterError> {
        self.record("get_server", namespace, name);
        if let Some(e) = self.injected_failure("get_server") {
            return Err(e);
        }
        self.server(namespace, name).ok_or_else(|| {
            ClusterError::NotFound(format!("weblogicservers \"{}\" not found", name))
        })
    }

    async fn replace_server(
        &self,
        server: &WeblogicServer,
    ) -> Result<WeblogicServer, ClusterError> {
        let (namespace, name) = key_of(&server.metadata, "default")?;
        self.record("replace_server", &namespace, &name);
        if let Some(e) = self.injected_failure("replace_server") {
            return Err(e);
        }
        let version = self.bump_version();
        let mut servers = self.servers.lock().unwrap();
        let stored = servers.get_mut(&(namespace, name.clone())).ok_or_else(|| {
            ClusterError::NotFound(format!("weblogicservers \"{}\" not found", name))
        })?;
        check_version(&stored.metadata, &server.metadata)?;
        // status is a subresource: a plain replace leaves it untouched
        let status = stored.status.clone();
        *stored = server.clone();
        stored.status = status;
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn replace_server_status(
        &self,
        server: &WeblogicServer,
    ) -> Result<WeblogicServer, ClusterError> {
        let (namespace, name) = key_of(&server.metadata, "default")?;
        self.record("replace_server_status", &namespace, &name);
        if let Some(e) = self.injected_failure("replace_server_status") {
            return Err(e);
        }
        let version = self.bump_version();
        let mut servers = self.servers.lock().unwrap();
        let stored = servers.get_mut(&(namespace, name.clone())).ok_or_else(|| {
            ClusterError::NotFound(format!("weblogicservers \"{}\" not found", name))
        })?;
        check_version(&stored.metadata, &server.metadata)?;
        stored.status = server.status.clone();
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn list_services(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Service>, ClusterError> {
        self.record("list_services", namespace, label_selector);
        if let Some(e) = self.injected_failure("list_services") {
            return Err(e);
        }
        Ok(self.select(&*self.services, namespace, label_selector, |svc| {
            svc.metadata.labels.as_ref()
        }))
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClusterError> {
        let (_, name) = key_of(&service.metadata, namespace)?;
        self.record("create_service", namespace, &name);
        if let Some(e) = self.injected_failure("create_service") {
            return Err(e);
        }
        let key = (namespace.to_string(), name.clone());
        if self.services.lock().unwrap().contains_key(&key) {
            return Err(ClusterError::Conflict(format!("services \"{}\" already exists", name)));
        }
        let mut created = service.clone();
        self.stamp(&mut created.metadata, namespace);
        self.services.lock().unwrap().insert(key, created.clone());
        Ok(created)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.record("delete_service", namespace, name);
        if let Some(e) = self.injected_failure("delete_service") {
            return Err(e);
        }
        self.services
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound(format!("services \"{}\" not found", name)))
    }

    async fn list_stateful_sets(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<StatefulSet>, ClusterError> {
        self.record("list_stateful_sets", namespace, label_selector);
        if let Some(e) = self.injected_failure("list_stateful_sets") {
            return Err(e);
        }
        Ok(self.select(&*self.stateful_sets, namespace, label_selector, |sts| {
            sts.metadata.labels.as_ref()
        }))
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError> {
        let (_, name) = key_of(&stateful_set.metadata, namespace)?;
        self.record("create_stateful_set", namespace, &name);
        if let Some(e) = self.injected_failure("create_stateful_set") {
            return Err(e);
        }
        let key = (namespace.to_string(), name.clone());
        if self.stateful_sets.lock().unwrap().contains_key(&key) {
            return Err(ClusterError::Conflict(format!(
                "statefulsets.apps \"{}\" already exists",
                name
            )));
        }
        let mut created = stateful_set.clone();
        self.stamp(&mut created.metadata, namespace);
        self.stateful_sets.lock().unwrap().insert(key, created.clone());
        Ok(created)
    }

    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.record("delete_stateful_set", namespace, name);
        if let Some(e) = self.injected_failure("delete_stateful_set") {
            return Err(e);
        }
        self.stateful_sets
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| {
                ClusterError::NotFound(format!("statefulsets.apps \"{}\" not found", name))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{ServerPhase, WeblogicServerSpec, WeblogicServerStatus, server_labels};

    fn server(name: &str) -> WeblogicServer {
        WeblogicServer {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: WeblogicServerSpec::default(),
            status: None,
        }
    }

    fn service(name: &str, owner: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                labels: Some(server_labels(owner)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stale_status_write_conflicts() {
        let mock = MockClusterClient::new();
        let stored = mock.add_server(server("web1"));
        mock.touch_server("default", "web1");

        let mut stale = stored.clone();
        stale.status = Some(WeblogicServerStatus {
            phase: ServerPhase::Running,
            errors: vec![],
        });
        let err = mock.replace_server_status(&stale).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_replace_server_keeps_status() {
        let mock = MockClusterClient::new();
        let mut stored = mock.add_server(server("web1"));
        stored.status = Some(WeblogicServerStatus {
            phase: ServerPhase::Pending,
            errors: vec![],
        });
        let stored = mock.replace_server_status(&stored).await.unwrap();

        let mut relabelled = stored.clone();
        relabelled.status = None;
        relabelled.insert_server_label();
        let updated = mock.replace_server(&relabelled).await.unwrap();
        assert!(updated.has_server_label());
        assert_eq!(updated.status.unwrap().phase, ServerPhase::Pending);
        assert_ne!(updated.metadata.resource_version, stored.metadata.resource_version);
    }

    #[tokio::test]
    async fn test_list_filters_by_selector() {
        let mock = MockClusterClient::new();
        mock.add_service(service("web1", "web1"));
        mock.add_service(service("web2", "web2"));

        let found = mock.list_services("default", "server-label=web1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name.as_deref(), Some("web1"));

        mock.set_ignore_selectors(true);
        let found = mock.list_services("default", "server-label=web1").await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_existence_selector() {
        let labels = server_labels("web1");
        assert!(matches_selector(Some(&labels), "server-label"));
        assert!(!matches_selector(Some(&labels), "app"));
        assert!(!matches_selector(None, "server-label=web1"));
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let mock = MockClusterClient::new();
        mock.fail_next(
            "list_services",
            ClusterError::Api { code: 500, message: "etcd unavailable".to_string() },
        );
        assert!(mock.list_services("default", "server-label=web1").await.is_err());
        assert!(mock.list_services("default", "server-label=web1").await.is_ok());
        assert_eq!(mock.call_count("list_services"), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let mock = MockClusterClient::new();
        let err = mock.delete_stateful_set("default", "web1").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
