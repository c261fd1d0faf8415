//! In-memory collaborators for development and testing.
//!
//! - [`MemoryStore`]: machine records with optimistic concurrency and a
//!   compare-and-swap control-plane initialization marker
//! - [`MemoryBackend`]: simulated VMs; also answers control-plane probes
//! - [`MemoryClusterClients`]: per-cluster bootstrap token registry

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use machinery_id::{ClusterId, MachineId};
use machinery_tokens::{BootstrapToken, BootstrapTokenSecret};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::backend::{ProvisionMode, ProvisioningBackend};
use crate::clients::{
    ClusterClient, ClusterClientFactory, ControlPlaneProbe, ControlPlaneStatus, MachinePatch,
    MachineStore,
};
use crate::context::{ClusterContext, MachineContext};
use crate::model::{AddressType, Cluster, Machine, MachineAddress};
use crate::role::Role;

// =============================================================================
// Store
// =============================================================================

#[derive(Default)]
struct StoreState {
    machines: BTreeMap<MachineId, Machine>,
    init_claims: HashMap<ClusterId, MachineId>,
    patches: usize,
}

/// Machine record store kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a machine record.
    pub async fn insert(&self, machine: Machine) {
        self.state.lock().await.machines.insert(machine.uid, machine);
    }

    pub async fn get(&self, uid: MachineId) -> Option<Machine> {
        self.state.lock().await.machines.get(&uid).cloned()
    }

    /// All machines, ordered by id.
    pub async fn machines(&self) -> Vec<Machine> {
        self.state.lock().await.machines.values().cloned().collect()
    }

    /// Number of status patches applied.
    pub async fn patch_count(&self) -> usize {
        self.state.lock().await.patches
    }

    /// Machine holding the control-plane initialization claim for `cluster`.
    pub async fn init_claim(&self, cluster: ClusterId) -> Option<MachineId> {
        self.state.lock().await.init_claims.get(&cluster).copied()
    }
}

#[async_trait]
impl MachineStore for MemoryStore {
    async fn list_cluster_machines(&self, cluster: &Cluster) -> Result<Vec<Machine>> {
        let state = self.state.lock().await;
        Ok(state
            .machines
            .values()
            .filter(|m| {
                m.namespace == cluster.namespace && m.cluster_name() == Some(cluster.name.as_str())
            })
            .cloned()
            .collect())
    }

    async fn patch_machine_status(&self, patch: &MachinePatch) -> Result<u64> {
        let mut state = self.state.lock().await;
        let Some(machine) = state.machines.get_mut(&patch.uid) else {
            bail!("machine {}/{} not found", patch.namespace, patch.name);
        };
        if machine.resource_version != patch.resource_version {
            bail!(
                "conflict patching machine {}/{}: resource version {} is stale (current {})",
                patch.namespace,
                patch.name,
                patch.resource_version,
                machine.resource_version
            );
        }

        machine.status = patch.status.clone();
        machine.resource_version += 1;
        let version = machine.resource_version;
        state.patches += 1;
        Ok(version)
    }

    async fn claim_control_plane_init(&self, cluster: &Cluster, machine: &Machine) -> Result<bool> {
        let mut state = self.state.lock().await;
        if let Some(holder) = state.init_claims.get(&cluster.uid).copied() {
            if holder == machine.uid {
                return Ok(true);
            }
            let holder_live = state.machines.get(&holder).is_some_and(|m| {
                !m.deletion_requested && m.role().is_ok_and(|role| role.is_control_plane())
            });
            if holder_live {
                return Ok(false);
            }
            debug!(
                cluster = %cluster.name,
                stale = %holder,
                machine = %machine.name,
                "[MEMORY] releasing stale init claim"
            );
        }
        state.init_claims.insert(cluster.uid, machine.uid);
        Ok(true)
    }
}

// =============================================================================
// Cluster clients
// =============================================================================

/// Bootstrap token registries of every cluster.
#[derive(Default)]
pub struct MemoryClusterClients {
    secrets: Arc<Mutex<HashMap<ClusterId, Vec<BootstrapTokenSecret>>>>,
}

impl MemoryClusterClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `token` is registered with `cluster` and unexpired.
    pub async fn token_valid(&self, cluster: ClusterId, token: &BootstrapToken) -> bool {
        let now = Utc::now();
        self.secrets
            .lock()
            .await
            .get(&cluster)
            .is_some_and(|secrets| secrets.iter().any(|s| s.matches(token) && !s.is_expired(now)))
    }

    /// Number of tokens registered with `cluster`.
    pub async fn token_count(&self, cluster: ClusterId) -> usize {
        self.secrets.lock().await.get(&cluster).map_or(0, Vec::len)
    }
}

struct MemoryClusterClient {
    cluster: ClusterId,
    secrets: Arc<Mutex<HashMap<ClusterId, Vec<BootstrapTokenSecret>>>>,
}

#[async_trait]
impl ClusterClient for MemoryClusterClient {
    async fn create_bootstrap_token_secret(&self, secret: &BootstrapTokenSecret) -> Result<()> {
        let mut secrets = self.secrets.lock().await;
        let registered = secrets.entry(self.cluster).or_default();
        if registered.iter().any(|s| s.name == secret.name) {
            bail!("secret {}/{} already exists", secret.namespace, secret.name);
        }
        registered.push(secret.clone());
        Ok(())
    }
}

#[async_trait]
impl ClusterClientFactory for MemoryClusterClients {
    async fn client_for_cluster(&self, cluster: &ClusterContext) -> Result<Arc<dyn ClusterClient>> {
        Ok(Arc::new(MemoryClusterClient {
            cluster: cluster.cluster.uid,
            secrets: Arc::clone(&self.secrets),
        }))
    }
}

// =============================================================================
// Backend
// =============================================================================

#[derive(Debug, Clone)]
struct Vm {
    instance_id: String,
    cluster: ClusterId,
    role: Option<Role>,
    address: String,
}

#[derive(Default)]
struct BackendState {
    vms: BTreeMap<MachineId, Vm>,
    online: HashSet<ClusterId>,
}

/// Simulated virtualization backend.
///
/// A bootstrap-mode create brings the cluster's control plane online; a
/// join-mode create requires a token registered with the cluster.
pub struct MemoryBackend {
    clients: Arc<MemoryClusterClients>,
    state: Mutex<BackendState>,
    counter: AtomicU64,
}

impl MemoryBackend {
    pub fn new(clients: Arc<MemoryClusterClients>) -> Self {
        Self {
            clients,
            state: Mutex::new(BackendState::default()),
            counter: AtomicU64::new(0),
        }
    }

    pub async fn vm_count(&self) -> usize {
        self.state.lock().await.vms.len()
    }

    fn next_vm(&self) -> (String, String) {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        (format!("vm-{:06}", n), format!("10.0.{}.{}", n / 250, n % 250 + 2))
    }
}

#[async_trait]
impl ProvisioningBackend for MemoryBackend {
    async fn create(&self, ctx: &mut MachineContext, mode: &ProvisionMode) -> Result<()> {
        let cluster = ctx.cluster.cluster.uid;
        if let Some(token) = mode.token() {
            if !self.clients.token_valid(cluster, token).await {
                bail!("bootstrap token {} is not registered with cluster {}", token.id(), ctx.cluster);
            }
        }

        let mut state = self.state.lock().await;
        let vm = match state.vms.get(&ctx.machine.uid).cloned() {
            Some(vm) => {
                debug!(machine = %ctx, instance_id = %vm.instance_id, "[MEMORY] VM already exists");
                vm
            }
            None => {
                let (instance_id, address) = self.next_vm();
                let vm = Vm {
                    instance_id,
                    cluster,
                    role: ctx.role().ok(),
                    address,
                };
                info!(
                    machine = %ctx,
                    instance_id = %vm.instance_id,
                    template = %ctx.machine_config.template,
                    cpus = ctx.machine_config.num_cpus,
                    memory_mib = ctx.machine_config.memory_mib,
                    bootstrap = mode.token().is_none(),
                    "[MEMORY] VM created"
                );
                state.vms.insert(ctx.machine.uid, vm.clone());
                vm
            }
        };
        if mode.token().is_none() {
            state.online.insert(cluster);
        }
        drop(state);

        stage_running(ctx, &vm);
        Ok(())
    }

    async fn delete(&self, ctx: &mut MachineContext) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(vm) = state.vms.remove(&ctx.machine.uid) {
            info!(machine = %ctx, instance_id = %vm.instance_id, "[MEMORY] VM destroyed");
            let control_plane_left = state
                .vms
                .values()
                .any(|v| v.cluster == vm.cluster && v.role.is_some_and(|r| r.is_control_plane()));
            if !control_plane_left {
                state.online.remove(&vm.cluster);
            }
        }
        drop(state);

        let status = ctx.status_mut();
        status.addresses.clear();
        status.instance_id = None;
        status.provider_state = Some("notFound".to_string());
        Ok(())
    }

    async fn update(&self, ctx: &mut MachineContext) -> Result<()> {
        let vm = self.state.lock().await.vms.get(&ctx.machine.uid).cloned();
        match vm {
            Some(vm) => stage_running(ctx, &vm),
            None => ctx.status_mut().provider_state = Some("notFound".to_string()),
        }
        Ok(())
    }

    async fn exists(&self, ctx: &MachineContext) -> Result<bool> {
        Ok(self.state.lock().await.vms.contains_key(&ctx.machine.uid))
    }
}

fn stage_running(ctx: &mut MachineContext, vm: &Vm) {
    let status = ctx.status_mut();
    status.instance_id = Some(vm.instance_id.clone());
    status.provider_state = Some("poweredOn".to_string());
    status.addresses = vec![MachineAddress {
        address_type: AddressType::InternalIP,
        address: vm.address.clone(),
    }];
}

#[async_trait]
impl ControlPlaneProbe for MemoryBackend {
    async fn control_plane_status(&self, cluster: &ClusterContext) -> Result<ControlPlaneStatus> {
        if self.state.lock().await.online.contains(&cluster.cluster.uid) {
            Ok(ControlPlaneStatus::online("control plane answering"))
        } else {
            Ok(ControlPlaneStatus::offline("no control plane member running"))
        }
    }
}
