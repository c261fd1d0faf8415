//! Cluster and machine objects as the actuator sees them.
//!
//! Provider-specific configuration travels as opaque JSON on the objects
//! (`provider_spec`) and is decoded into [`ClusterProviderConfig`] and
//! [`MachineProviderConfig`] when an operation context is built.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use machinery_id::{ClusterId, MachineId};
use serde::{Deserialize, Serialize};

use crate::role::{Role, RoleError, CLUSTER_NAME_LABEL, ROLE_LABEL};

/// A logical cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub uid: ClusterId,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub provider_spec: serde_json::Value,
}

impl Cluster {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: ClusterId::new(),
            name: name.into(),
            namespace: namespace.into(),
            provider_spec: serde_json::Value::Null,
        }
    }

    pub fn with_provider_config(mut self, config: &ClusterProviderConfig) -> Self {
        self.provider_spec = serde_json::to_value(config).unwrap_or_default();
        self
    }
}

/// A single compute node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub uid: MachineId,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub provider_spec: serde_json::Value,
    #[serde(default)]
    pub status: MachineStatus,
    /// Optimistic-concurrency token; bumped by the store on every write.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub deletion_requested: bool,
}

impl Machine {
    /// A machine in `cluster` with the given role label.
    pub fn new(cluster: &Cluster, name: impl Into<String>, role: Role) -> Self {
        let labels = BTreeMap::from([
            (CLUSTER_NAME_LABEL.to_string(), cluster.name.clone()),
            (ROLE_LABEL.to_string(), role.as_label().to_string()),
        ]);
        Self {
            uid: MachineId::new(),
            name: name.into(),
            namespace: cluster.namespace.clone(),
            labels,
            provider_spec: serde_json::Value::Null,
            status: MachineStatus::default(),
            resource_version: 0,
            deletion_requested: false,
        }
    }

    pub fn role(&self) -> Result<Role, RoleError> {
        Role::from_labels(&self.labels)
    }

    pub fn cluster_name(&self) -> Option<&str> {
        self.labels.get(CLUSTER_NAME_LABEL).map(String::as_str)
    }
}

/// A PEM certificate and its private key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    #[serde(default)]
    pub cert: String,
    #[serde(default)]
    pub key: String,
}

impl KeyPair {
    pub fn new(cert: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
        }
    }

    /// Both halves are present.
    pub fn has_cert_and_key(&self) -> bool {
        !self.cert.trim().is_empty() && !self.key.trim().is_empty()
    }
}

/// Cluster-wide provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClusterProviderConfig {
    /// Cluster CA; gates provisioning of every machine.
    #[serde(default)]
    pub ca_key_pair: KeyPair,
    #[serde(default)]
    pub etcd_ca_key_pair: KeyPair,
    #[serde(default)]
    pub front_proxy_ca_key_pair: KeyPair,
    #[serde(default)]
    pub sa_key_pair: KeyPair,
    /// `host:port` of the control plane API, once known.
    #[serde(default)]
    pub control_plane_endpoint: Option<String>,
}

/// Per-machine provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MachineProviderConfig {
    /// Image or template the VM is cloned from.
    #[serde(default)]
    pub template: String,
    #[serde(default = "default_num_cpus")]
    pub num_cpus: u32,
    #[serde(default = "default_memory_mib")]
    pub memory_mib: u64,
    #[serde(default = "default_disk_gib")]
    pub disk_gib: u32,
    #[serde(default)]
    pub networks: Vec<String>,
}

fn default_num_cpus() -> u32 {
    2
}

fn default_memory_mib() -> u64 {
    2048
}

fn default_disk_gib() -> u32 {
    20
}

impl Default for MachineProviderConfig {
    fn default() -> Self {
        Self {
            template: String::new(),
            num_cpus: default_num_cpus(),
            memory_mib: default_memory_mib(),
            disk_gib: default_disk_gib(),
            networks: Vec::new(),
        }
    }
}

/// Decode a provider spec; an absent spec decodes to the default config.
pub(crate) fn decode_provider_spec<T>(spec: &serde_json::Value) -> Result<T, serde_json::Error>
where
    T: Default + serde::de::DeserializeOwned,
{
    if spec.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(spec.clone())
}

/// Observed state of a machine, as staged by lifecycle operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    #[serde(default)]
    pub addresses: Vec<MachineAddress>,
    /// Backend identifier of the VM.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Backend-reported power/provisioning state.
    #[serde(default)]
    pub provider_state: Option<String>,
    #[serde(default)]
    pub last_operation: Option<LastOperation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressType {
    InternalIP,
    ExternalIP,
    Hostname,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineAddress {
    #[serde(rename = "type")]
    pub address_type: AddressType,
    pub address: String,
}

/// Lifecycle operation kinds that stage status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub const fn verb(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    Succeeded,
    Failed,
    Requeued,
}

/// Record of the most recent lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    pub kind: OperationKind,
    pub state: OperationState,
    pub description: String,
    pub last_updated: DateTime<Utc>,
}
