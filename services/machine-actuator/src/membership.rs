//! Control-plane membership queries.
//!
//! Both queries are recomputed on every call; nothing here is cached.

use anyhow::Result;
use tracing::debug;

use crate::clients::ControlPlaneProbe;
use crate::context::{ClusterContext, MachineContext};
use crate::model::Machine;
use crate::role::Role;

/// A cluster's machines at one instant, partitioned by role.
#[derive(Debug, Clone, Default)]
pub struct MachineSet {
    control_plane: Vec<Machine>,
    workers: Vec<Machine>,
    /// Machines whose role label is missing or unknown.
    unassigned: Vec<Machine>,
}

impl MachineSet {
    /// Partition machines by role, skipping ones being deleted.
    pub fn from_machines(machines: impl IntoIterator<Item = Machine>) -> Self {
        let mut set = Self::default();
        for machine in machines.into_iter().filter(|m| !m.deletion_requested) {
            match machine.role() {
                Ok(Role::ControlPlane) => set.control_plane.push(machine),
                Ok(Role::Worker) => set.workers.push(machine),
                Err(_) => set.unassigned.push(machine),
            }
        }
        set
    }

    pub fn control_plane(&self) -> &[Machine] {
        &self.control_plane
    }

    pub fn workers(&self) -> &[Machine] {
        &self.workers
    }

    pub fn unassigned(&self) -> &[Machine] {
        &self.unassigned
    }

    /// Control-plane members with `machine` counted exactly once, whether
    /// or not the listing already contained it.
    pub fn control_plane_count_including(&self, machine: &Machine) -> usize {
        let others = self
            .control_plane
            .iter()
            .filter(|m| m.uid != machine.uid)
            .count();
        match machine.role() {
            Ok(Role::ControlPlane) => others + 1,
            Ok(Role::Worker) | Err(_) => others,
        }
    }
}

/// List the machines of the context's cluster.
pub async fn cluster_machines(ctx: &MachineContext) -> Result<MachineSet> {
    let machines = ctx.store().list_cluster_machines(&ctx.cluster.cluster).await?;
    let set = MachineSet::from_machines(machines);
    debug!(
        machine = %ctx,
        control_plane = set.control_plane().len(),
        workers = set.workers().len(),
        "listed cluster machines"
    );
    Ok(set)
}

/// Whether the cluster's control plane answers requests.
///
/// A probe error counts as offline.
pub async fn control_plane_online(probe: &dyn ControlPlaneProbe, cluster: &ClusterContext) -> bool {
    match probe.control_plane_status(cluster).await {
        Ok(status) => {
            debug!(cluster = %cluster, online = status.online, detail = %status.detail, "control plane status");
            status.online
        }
        Err(e) => {
            debug!(cluster = %cluster, error = %e, "control plane status unavailable");
            false
        }
    }
}
