//! Ownership label helpers.
//!
//! A `WeblogicServer` and the Service/StatefulSet it owns are linked only by
//! the `server-label=<server name>` label. There is no owner reference.

use std::collections::BTreeMap;

/// Label key carried by a server and all of its dependent resources.
pub const SERVER_LABEL: &str = "server-label";

/// Returns true if `labels` carries `server-label=<server_name>`.
pub fn has_server_label(labels: Option<&BTreeMap<String, String>>, server_name: &str) -> bool {
    labels
        .and_then(|labels| labels.get(SERVER_LABEL))
        .is_some_and(|value| value == server_name)
}

/// Label selector string matching resources owned by `server_name`.
pub fn label_selector_for(server_name: &str) -> String {
    format!("{}={}", SERVER_LABEL, server_name)
}

/// Label set stamped onto resources owned by `server_name`.
pub fn server_labels(server_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(SERVER_LABEL.to_string(), server_name.to_string())])
}

/// Name of the owning server, if the label is present.
pub fn owning_server(labels: Option<&BTreeMap<String, String>>) -> Option<&str> {
    labels.and_then(|labels| labels.get(SERVER_LABEL)).map(String::as_str)
}
