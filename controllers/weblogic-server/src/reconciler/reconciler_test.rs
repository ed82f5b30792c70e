//! Unit tests for the WeblogicServer and StatefulSet event handlers

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::events::ResourceEvent;
    use crate::test_utils::*;
    use cluster_client::{ClusterError, MockClusterClient};
    use crds::{SERVER_LABEL, ServerPhase, WeblogicServer};
    use k8s_openapi::api::apps::v1::StatefulSet;
    use kube::ResourceExt;

    fn stored(mock: &MockClusterClient, name: &str) -> WeblogicServer {
        mock.server("default", name).unwrap()
    }

    fn phase_of(server: &WeblogicServer) -> Option<ServerPhase> {
        server.status.as_ref().map(|s| s.phase)
    }

    fn with_ready(mut sts: StatefulSet, ready: i32) -> StatefulSet {
        sts.status.get_or_insert_with(Default::default).ready_replicas = Some(ready);
        sts
    }

    #[tokio::test]
    async fn test_create_scenario_reaches_running() {
        let mock = MockClusterClient::new();
        let reconciler = create_test_reconciler(&mock);
        let mut server = create_test_server("web1", "default");
        server.spec.replicas = 1;
        let added = mock.add_server(server);

        // first pass only labels and defaults the server
        reconciler.handle_server_event(ResourceEvent::Added(added.clone())).await;
        let labeled = stored(&mock, "web1");
        assert!(labeled.has_server_label());
        assert_eq!(labeled.spec.version, "12.2.1.2");
        assert_eq!(labeled.spec.managed_server_count, 1);
        assert!(mock.services("default").is_empty());

        // the label write comes back as an update and creates the dependents
        reconciler
            .handle_server_event(ResourceEvent::Updated { old: added, new: labeled })
            .await;
        let services = mock.services("default");
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name_any(), "web1");
        assert_eq!(services[0].spec.as_ref().unwrap().ports.as_ref().unwrap()[0].port, 7001);
        let stateful_sets = mock.stateful_sets("default");
        assert_eq!(stateful_sets.len(), 1);
        let sts = stateful_sets[0].clone();
        assert_eq!(sts.name_any(), "web1");
        assert_eq!(sts.spec.as_ref().unwrap().replicas, Some(1));

        let pending = with_ready(sts.clone(), 0);
        reconciler
            .handle_workload_event(ResourceEvent::Updated {
                old: sts.clone(),
                new: pending.clone(),
            })
            .await;
        assert_eq!(phase_of(&stored(&mock, "web1")), Some(ServerPhase::Pending));

        let running = with_ready(sts, 1);
        reconciler
            .handle_workload_event(ResourceEvent::Updated { old: pending, new: running })
            .await;
        let server = stored(&mock, "web1");
        assert_eq!(phase_of(&server), Some(ServerPhase::Running));
        assert!(server.status.unwrap().errors.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_create_is_idempotent() {
        let mock = MockClusterClient::new();
        let reconciler = create_test_reconciler(&mock);
        let server = mock.add_server(create_labeled_server("web1", "default"));

        reconciler.reconcile_create(&server).await.unwrap();
        reconciler.reconcile_create(&server).await.unwrap();

        assert_eq!(mock.services("default").len(), 1);
        assert_eq!(mock.stateful_sets("default").len(), 1);
        assert_eq!(mock.call_count("create_service"), 1);
        assert_eq!(mock.call_count("create_stateful_set"), 1);
    }

    #[tokio::test]
    async fn test_unlabeled_server_never_creates_dependents() {
        let mock = MockClusterClient::new();
        let reconciler = create_test_reconciler(&mock);
        let server = mock.add_server(create_test_server("web1", "default"));

        reconciler.reconcile_create(&server).await.unwrap();

        assert_eq!(mock.call_count("replace_server"), 1);
        assert_eq!(mock.call_count("list_services"), 0);
        assert_eq!(mock.call_count("create_service"), 0);
        assert_eq!(mock.call_count("create_stateful_set"), 0);
        let labels = stored(&mock, "web1").metadata.labels.unwrap();
        assert_eq!(labels[SERVER_LABEL], "web1");
    }

    #[tokio::test]
    async fn test_resync_update_makes_no_calls() {
        let mock = MockClusterClient::new();
        let reconciler = create_test_reconciler(&mock);
        let server = mock.add_server(create_test_server("web1", "default"));

        reconciler
            .handle_server_event(ResourceEvent::Updated { old: server.clone(), new: server })
            .await;

        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_marks_failed() {
        let mock = MockClusterClient::new();
        let reconciler = create_test_reconciler(&mock);
        let mut server = create_labeled_server("web1", "default");
        server.spec.version = "latest".to_string();
        let server = mock.add_server(server);

        let err = reconciler.reconcile_create(&server).await.unwrap_err();
        assert!(matches!(err, ControllerError::Validation(_)));

        let status = stored(&mock, "web1").status.unwrap();
        assert_eq!(status.phase, ServerPhase::Failed);
        assert_eq!(status.errors, vec![err.to_string()]);
        assert_eq!(mock.call_count("list_services"), 0);
        assert_eq!(mock.call_count("create_service"), 0);

        // the status write re-triggers the handler; the same error is not logged twice
        let updated = stored(&mock, "web1");
        reconciler
            .handle_server_event(ResourceEvent::Updated { old: server, new: updated })
            .await;
        assert_eq!(stored(&mock, "web1").status.unwrap().errors.len(), 1);
        assert_eq!(mock.call_count("replace_server_status"), 1);
    }

    #[tokio::test]
    async fn test_dependent_creation_failure_marks_failed() {
        let mock = MockClusterClient::new();
        mock.fail_next(
            "create_stateful_set",
            ClusterError::Api {
                code: 500,
                message: "boom".to_string(),
            },
        );
        let reconciler = create_test_reconciler(&mock);
        let server = mock.add_server(create_labeled_server("web1", "default"));

        let err = reconciler.reconcile_create(&server).await.unwrap_err();

        assert_eq!(err.to_string(), "API error (500): boom");
        assert_eq!(mock.services("default").len(), 1);
        let status = stored(&mock, "web1").status.unwrap();
        assert_eq!(status.phase, ServerPhase::Failed);
        assert_eq!(status.errors, vec!["API error (500): boom"]);
    }

    #[tokio::test]
    async fn test_label_write_retries_on_conflict() {
        let mock = MockClusterClient::new();
        let reconciler = create_test_reconciler(&mock);
        let server = mock.add_server(create_test_server("web1", "default"));
        mock.touch_server("default", "web1");

        reconciler.reconcile_create(&server).await.unwrap();

        assert_eq!(mock.call_count("replace_server"), 2);
        assert_eq!(mock.call_count("get_server"), 1);
        assert!(stored(&mock, "web1").has_server_label());
    }

    #[tokio::test]
    async fn test_delete_tears_down_workload_then_endpoint() {
        let mock = MockClusterClient::new();
        let reconciler = create_test_reconciler(&mock);
        let server = mock.add_server(create_labeled_server("web1", "default"));
        reconciler.reconcile_create(&server).await.unwrap();
        mock.clear_calls();

        reconciler.handle_server_event(ResourceEvent::Deleted(server)).await;

        assert!(mock.services("default").is_empty());
        assert!(mock.stateful_sets("default").is_empty());
        let deletes: Vec<String> = mock
            .calls()
            .into_iter()
            .filter(|call| call.starts_with("delete_"))
            .collect();
        assert_eq!(
            deletes,
            vec!["delete_stateful_set default/web1", "delete_service default/web1"]
        );
    }

    #[tokio::test]
    async fn test_delete_with_absent_workload_keeps_endpoint() {
        let mock = MockClusterClient::new();
        mock.add_service(create_test_service("web1", "default", Some("web1")));
        let reconciler = create_test_reconciler(&mock);
        let server = mock.add_server(create_labeled_server("web1", "default"));

        let err = reconciler.reconcile_delete(&server).await.unwrap_err();

        assert!(matches!(err, ControllerError::NotFound { kind: "StatefulSet", .. }));
        assert_eq!(mock.call_count("list_services"), 0);
        assert_eq!(mock.call_count("delete_service"), 0);
        assert_eq!(mock.services("default").len(), 1);
        assert_eq!(mock.call_count("replace_server_status"), 1);
        let status = stored(&mock, "web1").status.unwrap();
        assert_eq!(status.phase, ServerPhase::Failed);
        assert_eq!(status.errors, vec![err.to_string()]);
    }

    #[tokio::test]
    async fn test_workload_with_zero_replicas_is_running() {
        let mock = MockClusterClient::new();
        mock.add_server(create_labeled_server("web1", "default"));
        let reconciler = create_test_reconciler(&mock);

        let sts = create_test_stateful_set("web1", "default", Some("web1"), Some(0), Some(0));
        reconciler.handle_workload_event(ResourceEvent::Added(sts)).await;

        assert_eq!(phase_of(&stored(&mock, "web1")), Some(ServerPhase::Running));
    }

    #[tokio::test]
    async fn test_workload_defaults_missing_counts() {
        let mock = MockClusterClient::new();
        mock.add_server(create_labeled_server("web1", "default"));
        let reconciler = create_test_reconciler(&mock);

        let sts = create_test_stateful_set("web1", "default", Some("web1"), None, None);
        reconciler.reconcile_workload(&sts).await.unwrap();

        assert_eq!(phase_of(&stored(&mock, "web1")), Some(ServerPhase::Pending));
    }

    #[tokio::test]
    async fn test_workload_scaling_down_keeps_phase() {
        let mock = MockClusterClient::new();
        mock.add_server(create_labeled_server("web1", "default"));
        let reconciler = create_test_reconciler(&mock);

        let sts = create_test_stateful_set("web1", "default", Some("web1"), Some(1), Some(3));
        reconciler.reconcile_workload(&sts).await.unwrap();

        assert_eq!(phase_of(&stored(&mock, "web1")), None);
        assert_eq!(mock.call_count("replace_server_status"), 0);
    }

    #[tokio::test]
    async fn test_unlabeled_workload_is_dropped() {
        let mock = MockClusterClient::new();
        let reconciler = create_test_reconciler(&mock);

        let sts = create_test_stateful_set("stray", "default", None, Some(1), Some(1));
        reconciler.handle_workload_event(ResourceEvent::Deleted(sts)).await;

        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_workload_for_missing_server_is_dropped() {
        let mock = MockClusterClient::new();
        let reconciler = create_test_reconciler(&mock);

        let sts = create_test_stateful_set("web1", "default", Some("web1"), Some(1), Some(1));
        let err = reconciler.reconcile_workload(&sts).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(mock.call_count("replace_server_status"), 0);
    }
}
