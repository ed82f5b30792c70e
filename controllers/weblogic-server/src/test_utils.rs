//! Test utilities for unit testing the reconciler
//!
//! Builders for servers and dependents, plus a reconciler wired to a mock cluster.

use crate::config::ControllerConfig;
use crate::reconciler::Reconciler;
use cluster_client::MockClusterClient;
use crds::{WeblogicServer, WeblogicServerSpec, server_labels};
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec, StatefulSetStatus};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;

/// Helper to create a WeblogicServer with an empty spec, no labels and no status
pub fn create_test_server(name: &str, namespace: &str) -> WeblogicServer {
    WeblogicServer {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: WeblogicServerSpec::default(),
        status: None,
    }
}

/// Helper to create a defaulted WeblogicServer that already carries its ownership label
pub fn create_labeled_server(name: &str, namespace: &str) -> WeblogicServer {
    let mut server = create_test_server(name, namespace);
    server.ensure_defaults();
    server.insert_server_label();
    server
}

/// Helper to create a Service, optionally labeled as owned by `owner`
pub fn create_test_service(name: &str, namespace: &str, owner: Option<&str>) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: owner.map(server_labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Helper to create a StatefulSet with the given desired and ready replica counts
pub fn create_test_stateful_set(
    name: &str,
    namespace: &str,
    owner: Option<&str>,
    desired: Option<i32>,
    ready: Option<i32>,
) -> StatefulSet {
    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: owner.map(server_labels),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: desired,
            ..Default::default()
        }),
        status: Some(StatefulSetStatus {
            ready_replicas: ready,
            ..Default::default()
        }),
    }
}

/// Helper to create a reconciler backed by `mock` with default configuration
pub fn create_test_reconciler(mock: &MockClusterClient) -> Reconciler {
    Reconciler::new(Arc::new(mock.clone()), &ControllerConfig::default())
}
