//! WeblogicServer CRD
//!
//! Declares a WebLogic server: the controller creates a NodePort Service and a
//! StatefulSet for it and reports observed health back on `status`.

use crate::labels::{self, SERVER_LABEL};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Version used when `spec.version` is empty.
pub const DEFAULT_VERSION: &str = "12.2.1.2";
/// Replica count used when `spec.replicas` is zero.
pub const DEFAULT_REPLICAS: i32 = 1;
/// Managed server count used when `spec.managedServerCount` is zero.
pub const DEFAULT_MANAGED_SERVER_COUNT: i32 = 1;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "weblogic.oracle.com",
    version = "v1",
    kind = "WeblogicServer",
    plural = "weblogicservers",
    shortname = "wls",
    namespaced,
    status = "WeblogicServerStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct WeblogicServerSpec {
    /// WebLogic image version (image tag)
    #[serde(default)]
    pub version: String,

    /// Number of managed servers in the domain
    #[serde(default)]
    pub managed_server_count: i32,

    /// Servers known to the domain
    #[serde(default)]
    pub servers_available: Vec<ServerEntry>,

    /// Servers currently running
    #[serde(default)]
    pub servers_running: Vec<ServerEntry>,

    /// Number of running WebLogic server instances
    #[serde(default, skip_serializing_if = "is_zero")]
    pub replicas: i32,

    /// Node labels a replica's node must carry to be scheduled there
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

/// A WebLogic server instance as seen by the domain.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntry {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub pod_name: String,
    #[serde(default)]
    pub port: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeblogicServerStatus {
    /// Observed phase
    #[serde(default)]
    pub phase: ServerPhase,

    /// Reconciliation errors, oldest first. Consecutive duplicates are coalesced.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Server phase
///
/// Serializes as PascalCase ("Running", "Failed", etc.).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ServerPhase {
    /// No observation yet
    #[default]
    Unknown,

    /// Fewer replicas ready than desired
    Pending,

    /// All desired replicas ready
    Running,

    /// The last reconciliation step failed
    Failed,
}

impl fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServerPhase::Unknown => "Unknown",
            ServerPhase::Pending => "Pending",
            ServerPhase::Running => "Running",
            ServerPhase::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Reasons a `WeblogicServer` spec is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error(
        "invalid server name {0:?}: must be a lowercase RFC 1123 label of at most 63 characters"
    )]
    InvalidName(String),

    #[error("invalid version {0:?}: expected a dotted numeric version such as {DEFAULT_VERSION}")]
    InvalidVersion(String),

    #[error("replicas must not be negative, got {0}")]
    NegativeReplicas(i32),

    #[error("managedServerCount must not be negative, got {0}")]
    NegativeManagedServerCount(i32),

    #[error("nodeSelector contains an empty key")]
    EmptyNodeSelectorKey,
}

impl WeblogicServer {
    /// Fills in spec fields the user omitted.
    pub fn ensure_defaults(&mut self) -> &mut Self {
        if self.spec.managed_server_count == 0 {
            self.spec.managed_server_count = DEFAULT_MANAGED_SERVER_COUNT;
        }
        if self.spec.replicas == 0 {
            self.spec.replicas = DEFAULT_REPLICAS;
        }
        if self.spec.version.is_empty() {
            self.spec.version = DEFAULT_VERSION.to_string();
        }
        self
    }

    /// Checks the server is usable for reconciliation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.metadata.name.as_deref().unwrap_or_default();
        if !is_dns_label(name) {
            return Err(ValidationError::InvalidName(name.to_string()));
        }
        if !is_dotted_numeric(&self.spec.version) {
            return Err(ValidationError::InvalidVersion(self.spec.version.clone()));
        }
        if self.spec.replicas < 0 {
            return Err(ValidationError::NegativeReplicas(self.spec.replicas));
        }
        if self.spec.managed_server_count < 0 {
            return Err(ValidationError::NegativeManagedServerCount(
                self.spec.managed_server_count,
            ));
        }
        if self.spec.node_selector.keys().any(|key| key.is_empty()) {
            return Err(ValidationError::EmptyNodeSelectorKey);
        }
        Ok(())
    }

    /// True if the ownership label is set to this server's name.
    pub fn has_server_label(&self) -> bool {
        let name = self.metadata.name.as_deref().unwrap_or_default();
        labels::has_server_label(self.metadata.labels.as_ref(), name)
    }

    /// Sets the ownership label. Returns false if it was already present.
    pub fn insert_server_label(&mut self) -> bool {
        if self.has_server_label() {
            return false;
        }
        let name = self.metadata.name.clone().unwrap_or_default();
        self.metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(SERVER_LABEL.to_string(), name);
        true
    }

    /// Selector matching this server's dependent resources.
    pub fn label_selector(&self) -> String {
        labels::label_selector_for(self.metadata.name.as_deref().unwrap_or_default())
    }
}

fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    let valid_char = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-';
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    bytes.iter().all(valid_char) && alnum(&bytes[0]) && alnum(&bytes[bytes.len() - 1])
}

fn is_dotted_numeric(version: &str) -> bool {
    !version.is_empty()
        && version
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}
