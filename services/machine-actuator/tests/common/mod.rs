//! Shared fixtures and fault-injecting collaborators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use machinery_actuator::bootstrap::{KubeadmTokenIssuer, TokenIssuer};
use machinery_actuator::clients::{
    ClusterClient, ClusterClientFactory, ControlPlaneProbe, ControlPlaneStatus, MachinePatch,
    MachineStore,
};
use machinery_actuator::context::{ClusterContext, MachineContext};
use machinery_actuator::memory::MemoryStore;
use machinery_actuator::model::{ClusterProviderConfig, KeyPair};
use machinery_actuator::{
    Actuator, ActuatorConfig, Cluster, Collaborators, Machine, ProvisionMode, ProvisioningBackend,
    Role,
};
use machinery_events::MemoryRecorder;
use machinery_tokens::{BootstrapToken, BootstrapTokenSecret};

// =============================================================================
// Fixtures
// =============================================================================

pub fn cluster_with_ca() -> Cluster {
    cluster_with_key_pair(KeyPair::new("ca-cert", "ca-key"))
}

pub fn cluster_with_key_pair(ca_key_pair: KeyPair) -> Cluster {
    Cluster::new("default", "c1").with_provider_config(&ClusterProviderConfig {
        ca_key_pair,
        ..Default::default()
    })
}

pub fn machine(cluster: &Cluster, name: &str, role: Role) -> Machine {
    Machine::new(cluster, name, role)
}

// =============================================================================
// Backend
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Create(ProvisionMode),
    Delete,
    Update,
    Exists,
}

/// Records every call; fails when told to.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<BackendCall>>,
    fail: Mutex<Option<String>>,
    exists: AtomicBool,
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_with(&self, message: &str) {
        *self.fail.lock().unwrap() = Some(message.to_string());
    }

    pub fn succeed(&self) {
        *self.fail.lock().unwrap() = None;
    }

    pub fn set_exists(&self, exists: bool) {
        self.exists.store(exists, Ordering::SeqCst);
    }

    fn enter(&self, call: BackendCall) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.fail.lock().unwrap().clone() {
            Some(message) => bail!(message),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProvisioningBackend for FakeBackend {
    async fn create(&self, ctx: &mut MachineContext, mode: &ProvisionMode) -> Result<()> {
        self.enter(BackendCall::Create(mode.clone()))?;
        ctx.status_mut().provider_state = Some("poweredOn".to_string());
        Ok(())
    }

    async fn delete(&self, ctx: &mut MachineContext) -> Result<()> {
        self.enter(BackendCall::Delete)?;
        ctx.status_mut().provider_state = Some("notFound".to_string());
        Ok(())
    }

    async fn update(&self, ctx: &mut MachineContext) -> Result<()> {
        self.enter(BackendCall::Update)?;
        ctx.status_mut().instance_id = Some("vm-42".to_string());
        Ok(())
    }

    async fn exists(&self, _ctx: &MachineContext) -> Result<bool> {
        self.enter(BackendCall::Exists)?;
        Ok(self.exists.load(Ordering::SeqCst))
    }
}

// =============================================================================
// Probe, clients, issuer
// =============================================================================

#[derive(Default)]
pub struct FakeProbe {
    online: AtomicBool,
    calls: AtomicUsize,
}

impl FakeProbe {
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlPlaneProbe for FakeProbe {
    async fn control_plane_status(&self, _cluster: &ClusterContext) -> Result<ControlPlaneStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.online.load(Ordering::SeqCst) {
            Ok(ControlPlaneStatus::online("ok"))
        } else {
            Ok(ControlPlaneStatus::offline("connection refused"))
        }
    }
}

#[derive(Default)]
pub struct FakeClusterClient {
    pub secrets: Mutex<Vec<BootstrapTokenSecret>>,
}

#[async_trait]
impl ClusterClient for FakeClusterClient {
    async fn create_bootstrap_token_secret(&self, secret: &BootstrapTokenSecret) -> Result<()> {
        self.secrets.lock().unwrap().push(secret.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeClients {
    pub client: Arc<FakeClusterClient>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FakeClients {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterClientFactory for FakeClients {
    async fn client_for_cluster(&self, _cluster: &ClusterContext) -> Result<Arc<dyn ClusterClient>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            bail!("kubeconfig secret not found");
        }
        Ok(self.client.clone())
    }
}

/// Delegates to the kubeadm issuer and records what it was asked.
#[derive(Default)]
pub struct FakeIssuer {
    ttls: Mutex<Vec<Duration>>,
    issued: Mutex<Vec<BootstrapToken>>,
    fail: AtomicBool,
}

impl FakeIssuer {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn ttls(&self) -> Vec<Duration> {
        self.ttls.lock().unwrap().clone()
    }

    pub fn issued(&self) -> Vec<BootstrapToken> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenIssuer for FakeIssuer {
    async fn new_bootstrap(&self, client: &dyn ClusterClient, ttl: Duration) -> Result<BootstrapToken> {
        self.ttls.lock().unwrap().push(ttl);
        if self.fail.load(Ordering::SeqCst) {
            bail!("bootstrap token registration rejected");
        }
        let token = KubeadmTokenIssuer.new_bootstrap(client, ttl).await?;
        self.issued.lock().unwrap().push(token.clone());
        Ok(token)
    }
}

// =============================================================================
// Store wrapper
// =============================================================================

/// Store whose listings never show any machine, as if none had been
/// registered yet. Writes and claims go to the inner store.
pub struct UnlistedStore(pub Arc<MemoryStore>);

#[async_trait]
impl MachineStore for UnlistedStore {
    async fn list_cluster_machines(&self, _cluster: &Cluster) -> Result<Vec<Machine>> {
        Ok(Vec::new())
    }

    async fn patch_machine_status(&self, patch: &MachinePatch) -> Result<u64> {
        self.0.patch_machine_status(patch).await
    }

    async fn claim_control_plane_init(&self, cluster: &Cluster, machine: &Machine) -> Result<bool> {
        self.0.claim_control_plane_init(cluster, machine).await
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Fakes {
    pub store: Arc<MemoryStore>,
    pub backend: Arc<FakeBackend>,
    pub clients: Arc<FakeClients>,
    pub probe: Arc<FakeProbe>,
    pub tokens: Arc<FakeIssuer>,
    pub recorder: Arc<MemoryRecorder>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            backend: Arc::new(FakeBackend::default()),
            clients: Arc::new(FakeClients::default()),
            probe: Arc::new(FakeProbe::default()),
            tokens: Arc::new(FakeIssuer::default()),
            recorder: Arc::new(MemoryRecorder::new()),
        }
    }

    pub fn actuator(&self) -> Actuator {
        self.actuator_with(ActuatorConfig::default())
    }

    pub fn actuator_with(&self, config: ActuatorConfig) -> Actuator {
        self.actuator_over(self.store.clone(), config)
    }

    pub fn actuator_over(&self, store: Arc<dyn MachineStore>, config: ActuatorConfig) -> Actuator {
        Actuator::new(
            Collaborators {
                store,
                backend: self.backend.clone(),
                clients: self.clients.clone(),
                probe: self.probe.clone(),
                tokens: self.tokens.clone(),
                recorder: self.recorder.clone(),
            },
            config,
        )
    }

    /// Register machines with the store.
    pub async fn register(&self, machines: &[&Machine]) {
        for machine in machines {
            self.store.insert((*machine).clone()).await;
        }
    }

    /// Neither client acquisition nor token issuance happened.
    pub fn no_join_attempt(&self) -> bool {
        self.clients.calls() == 0 && self.tokens.ttls().is_empty()
    }
}
