//! Per-operation contexts.
//!
//! A [`MachineContext`] is built at the start of every lifecycle operation
//! and dropped at its end. Backends stage status changes on it; the
//! actuator flushes them with a single [`MachineContext::patch`] on exit.

use std::sync::Arc;

use chrono::Utc;
use machinery_events::ObjectRef;
use machinery_reconcile::Outcome;
use tracing::debug;

use crate::clients::{MachinePatch, MachineStore};
use crate::error::{ActuatorResult, ContextError};
use crate::model::{
    decode_provider_spec, Cluster, ClusterProviderConfig, LastOperation, Machine,
    MachineProviderConfig, MachineStatus, OperationKind, OperationState,
};
use crate::role::{Role, RoleError};

/// A cluster with its decoded provider config.
#[derive(Debug, Clone)]
pub struct ClusterContext {
    pub cluster: Cluster,
    pub config: ClusterProviderConfig,
}

impl ClusterContext {
    pub fn new(cluster: Cluster) -> Result<Self, ContextError> {
        let config = decode_provider_spec(&cluster.provider_spec).map_err(|source| {
            ContextError::ClusterConfig {
                cluster: format!("{}/{}", cluster.namespace, cluster.name),
                source,
            }
        })?;
        Ok(Self { cluster, config })
    }

    /// The cluster CA is fully populated.
    pub fn has_ca_key_pair(&self) -> bool {
        self.config.ca_key_pair.has_cert_and_key()
    }
}

impl std::fmt::Display for ClusterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.cluster.namespace, self.cluster.name)
    }
}

/// Inputs for [`MachineContext::new`].
pub struct MachineContextParams<'a> {
    pub cluster: &'a Cluster,
    pub machine: &'a Machine,
    pub store: Arc<dyn MachineStore>,
}

/// Everything one lifecycle operation on one machine needs.
pub struct MachineContext {
    pub cluster: ClusterContext,
    pub machine: Machine,
    pub machine_config: MachineProviderConfig,
    store: Arc<dyn MachineStore>,
    /// Status as read when the context was built.
    snapshot: MachineStatus,
}

impl MachineContext {
    /// Resolve the cluster and machine. Fails fast on undecodable configs
    /// or a machine that is not a member of the cluster.
    pub fn new(params: MachineContextParams<'_>) -> Result<Self, ContextError> {
        let MachineContextParams {
            cluster,
            machine,
            store,
        } = params;

        let cluster = ClusterContext::new(cluster.clone())?;
        let display = format!("{}/{}", cluster, machine.name);

        let belongs = machine.namespace == cluster.cluster.namespace
            && machine
                .cluster_name()
                .is_none_or(|name| name == cluster.cluster.name);
        if !belongs {
            return Err(ContextError::ClusterMismatch {
                machine: format!("{}/{}", machine.namespace, machine.name),
                cluster: cluster.to_string(),
            });
        }

        let machine_config = decode_provider_spec(&machine.provider_spec)
            .map_err(|source| ContextError::MachineConfig {
                machine: display,
                source,
            })?;

        Ok(Self {
            cluster,
            snapshot: machine.status.clone(),
            machine: machine.clone(),
            machine_config,
            store,
        })
    }

    pub fn role(&self) -> Result<Role, RoleError> {
        self.machine.role()
    }

    pub fn store(&self) -> &Arc<dyn MachineStore> {
        &self.store
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(
            "Machine",
            &self.machine.namespace,
            &self.machine.name,
            self.machine.uid.to_string(),
        )
    }

    /// Staged status; flushed by [`MachineContext::patch`].
    pub fn status_mut(&mut self) -> &mut MachineStatus {
        &mut self.machine.status
    }

    pub fn has_staged_changes(&self) -> bool {
        self.machine.status != self.snapshot
    }

    /// Stage the outcome of `kind` as the machine's last operation.
    pub(crate) fn stage_last_operation(&mut self, kind: OperationKind, result: &ActuatorResult<Outcome>) {
        let (state, description) = match result {
            Ok(Outcome::Completed) => (OperationState::Succeeded, format!("{} succeeded", kind)),
            Ok(Outcome::RequeueAfter(after)) => (
                OperationState::Requeued,
                format!("{} waiting, retry in {}s", kind, after.as_secs()),
            ),
            Err(err) => (OperationState::Failed, err.chain()),
        };
        self.machine.status.last_operation = Some(LastOperation {
            kind,
            state,
            description,
            last_updated: Utc::now(),
        });
    }

    /// Write staged status back to the store.
    ///
    /// Returns whether a write was issued; an unchanged status is not sent.
    pub async fn patch(&mut self) -> anyhow::Result<bool> {
        if !self.has_staged_changes() {
            debug!(machine = %self, "no staged status changes");
            return Ok(false);
        }

        let patch = MachinePatch {
            uid: self.machine.uid,
            namespace: self.machine.namespace.clone(),
            name: self.machine.name.clone(),
            resource_version: self.machine.resource_version,
            status: self.machine.status.clone(),
        };
        let version = self.store.patch_machine_status(&patch).await?;

        self.machine.resource_version = version;
        self.snapshot = self.machine.status.clone();
        debug!(machine = %self, resource_version = version, "patched machine status");
        Ok(true)
    }
}

impl std::fmt::Display for MachineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.cluster, self.machine.name)
    }
}
