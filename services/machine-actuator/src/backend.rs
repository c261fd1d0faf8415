//! Provisioning backend interface.
//!
//! The backend owns the actual virtual machine. It may stage status on the
//! context it is handed (addresses, instance id, provider state); the
//! actuator flushes those changes after the call returns.

use anyhow::Result;
use async_trait::async_trait;
use machinery_tokens::BootstrapToken;

use crate::context::MachineContext;

/// How a new machine enters its cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionMode {
    /// First control-plane member; initializes the cluster.
    Bootstrap,
    /// Joins a running control plane with a bootstrap token.
    Join(BootstrapToken),
}

impl ProvisionMode {
    pub fn token(&self) -> Option<&BootstrapToken> {
        match self {
            ProvisionMode::Bootstrap => None,
            ProvisionMode::Join(token) => Some(token),
        }
    }
}

/// Virtualization backend.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Create the VM for the context's machine.
    async fn create(&self, ctx: &mut MachineContext, mode: &ProvisionMode) -> Result<()>;

    /// Destroy the VM.
    async fn delete(&self, ctx: &mut MachineContext) -> Result<()>;

    /// Copy backend-observed state into the staged machine status.
    async fn update(&self, ctx: &mut MachineContext) -> Result<()>;

    /// Whether the VM exists. Read-only.
    async fn exists(&self, ctx: &MachineContext) -> Result<bool>;
}
