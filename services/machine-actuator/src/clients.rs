//! Collaborator interfaces.
//!
//! The actuator never talks to the object store, the target cluster or the
//! control plane directly; it goes through these traits. Implementations
//! own their own timeouts and retries.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use machinery_id::MachineId;
use machinery_tokens::BootstrapTokenSecret;

use crate::context::ClusterContext;
use crate::model::{Cluster, Machine, MachineStatus};

/// Status write for one machine.
#[derive(Debug, Clone, PartialEq)]
pub struct MachinePatch {
    pub uid: MachineId,
    pub namespace: String,
    pub name: String,
    /// Version the patch was computed against.
    pub resource_version: u64,
    pub status: MachineStatus,
}

/// Persistent record store for machines.
#[async_trait]
pub trait MachineStore: Send + Sync {
    /// Machines labelled as members of `cluster`, in its namespace.
    async fn list_cluster_machines(&self, cluster: &Cluster) -> Result<Vec<Machine>>;

    /// Write a machine's status. Rejects stale `resource_version`s.
    ///
    /// Returns the new resource version.
    async fn patch_machine_status(&self, patch: &MachinePatch) -> Result<u64>;

    /// Atomically claim the right to initialize the control plane.
    ///
    /// Returns true if `machine` holds the claim (including when it already
    /// held it). Stores without a conditional write grant every claim.
    async fn claim_control_plane_init(&self, _cluster: &Cluster, _machine: &Machine) -> Result<bool> {
        Ok(true)
    }
}

/// Client for the API of a provisioned cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Register a bootstrap token with the cluster.
    async fn create_bootstrap_token_secret(&self, secret: &BootstrapTokenSecret) -> Result<()>;
}

/// Builds clients for provisioned clusters.
#[async_trait]
pub trait ClusterClientFactory: Send + Sync {
    async fn client_for_cluster(&self, cluster: &ClusterContext) -> Result<Arc<dyn ClusterClient>>;
}

/// Reachability of a cluster's control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPlaneStatus {
    pub online: bool,
    pub detail: String,
}

impl ControlPlaneStatus {
    pub fn online(detail: impl Into<String>) -> Self {
        Self {
            online: true,
            detail: detail.into(),
        }
    }

    pub fn offline(detail: impl Into<String>) -> Self {
        Self {
            online: false,
            detail: detail.into(),
        }
    }
}

/// Probes whether a cluster's control plane answers requests.
#[async_trait]
pub trait ControlPlaneProbe: Send + Sync {
    async fn control_plane_status(&self, cluster: &ClusterContext) -> Result<ControlPlaneStatus>;
}
