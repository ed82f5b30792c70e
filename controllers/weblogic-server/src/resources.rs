//! Templates for the resources a WeblogicServer owns.

use crds::{WeblogicServer, server_labels};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use serde_json::json;

/// Port the WebLogic admin/managed server listens on.
pub const WEBLOGIC_PORT: i32 = 7001;

const CONTAINER_NAME: &str = "weblogic";

fn owned_metadata(server: &WeblogicServer) -> ObjectMeta {
    let name = server.name_any();
    ObjectMeta {
        name: Some(name.clone()),
        namespace: server.namespace(),
        labels: Some(server_labels(&name)),
        ..Default::default()
    }
}

/// NodePort Service exposing the server's pods on [`WEBLOGIC_PORT`].
pub fn service_for_server(server: &WeblogicServer) -> Service {
    let name = server.name_any();
    Service {
        metadata: owned_metadata(server),
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_string()),
            ports: Some(vec![ServicePort {
                port: WEBLOGIC_PORT,
                ..Default::default()
            }]),
            selector: Some(server_labels(&name)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// StatefulSet running `spec.replicas` WebLogic pods behind `service_name`.
pub fn stateful_set_for_server(
    server: &WeblogicServer,
    service_name: &str,
    image: &str,
) -> Result<StatefulSet, serde_json::Error> {
    let name = server.name_any();
    let labels = server_labels(&name);
    let mut pod_spec = json!({
        "containers": [{
            "name": CONTAINER_NAME,
            "image": format!("{}:{}", image, server.spec.version),
            "ports": [{ "containerPort": WEBLOGIC_PORT }],
        }],
    });
    if !server.spec.node_selector.is_empty() {
        pod_spec["nodeSelector"] = json!(server.spec.node_selector);
    }

    let mut stateful_set: StatefulSet = serde_json::from_value(json!({
        "apiVersion": "apps/v1",
        "kind": "StatefulSet",
        "spec": {
            "serviceName": service_name,
            "replicas": server.spec.replicas,
            "selector": { "matchLabels": labels },
            "template": {
                "metadata": { "labels": labels },
                "spec": pod_spec,
            },
        },
    }))?;
    stateful_set.metadata = owned_metadata(server);
    Ok(stateful_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_server;
    use crds::SERVER_LABEL;

    #[test]
    fn test_service_template() {
        let server = create_test_server("web1", "default");
        let svc = service_for_server(&server);
        assert_eq!(svc.metadata.name.as_deref(), Some("web1"));
        assert_eq!(svc.metadata.namespace.as_deref(), Some("default"));
        let spec = svc.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("NodePort"));
        assert_eq!(spec.ports.unwrap()[0].port, 7001);
        assert_eq!(spec.selector.unwrap()[SERVER_LABEL], "web1");
    }

    #[test]
    fn test_stateful_set_template() {
        let mut server = create_test_server("web1", "default");
        server.spec.replicas = 2;
        server.spec.version = "12.2.1.3".to_string();
        server.spec.node_selector.insert("zone".to_string(), "a".to_string());

        let sts = stateful_set_for_server(&server, "web1-svc", "store/oracle/weblogic").unwrap();
        assert_eq!(sts.metadata.name.as_deref(), Some("web1"));
        assert_eq!(sts.metadata.labels.as_ref().unwrap()[SERVER_LABEL], "web1");

        let value = serde_json::to_value(&sts).unwrap();
        let spec = &value["spec"];
        assert_eq!(spec["serviceName"], "web1-svc");
        assert_eq!(spec["replicas"], 2);
        assert_eq!(spec["selector"]["matchLabels"][SERVER_LABEL], "web1");
        assert_eq!(spec["template"]["metadata"]["labels"][SERVER_LABEL], "web1");
        let pod = &spec["template"]["spec"];
        assert_eq!(pod["nodeSelector"]["zone"], "a");
        assert_eq!(pod["containers"][0]["image"], "store/oracle/weblogic:12.2.1.3");
        assert_eq!(pod["containers"][0]["ports"][0]["containerPort"], 7001);
    }

    #[test]
    fn test_stateful_set_without_node_selector() {
        let server = create_test_server("web1", "default");
        let sts = stateful_set_for_server(&server, "web1", "store/oracle/weblogic").unwrap();
        let value = serde_json::to_value(&sts).unwrap();
        assert!(value["spec"]["template"]["spec"].get("nodeSelector").is_none());
    }
}
