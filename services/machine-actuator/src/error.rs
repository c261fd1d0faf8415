//! Actuator error types.
//!
//! Every variant names the machine it concerns (`<namespace>/<cluster>/<machine>`)
//! and keeps the collaborator failure as its source. A requeue is never an
//! error; see [`machinery_reconcile::Outcome`].

use thiserror::Error;

use crate::role::RoleError;

/// Result type for actuator operations.
pub type ActuatorResult<T> = Result<T, ActuatorError>;

/// Failure to assemble the per-operation context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid provider config for cluster {cluster}")]
    ClusterConfig {
        cluster: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid provider config for machine {machine}")]
    MachineConfig {
        machine: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("machine {machine} does not belong to cluster {cluster}")]
    ClusterMismatch { machine: String, cluster: String },
}

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("unable to get machine role while creating machine {machine}")]
    InvalidRole {
        machine: String,
        #[source]
        source: RoleError,
    },

    #[error("unable to get control plane machines while creating machine {machine}")]
    ListMachines {
        machine: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unable to claim control plane initialization for machine {machine}")]
    ClaimInit {
        machine: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create machine as initial member of the control plane {machine}")]
    InitControlPlane {
        machine: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to get cluster client while creating machine {machine}")]
    ClusterClient {
        machine: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unable to generate bootstrap token for joining machine to cluster {machine}")]
    BootstrapToken {
        machine: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create machine and join it to the cluster {machine}")]
    Join {
        machine: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to delete machine {machine}")]
    Delete {
        machine: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to update machine {machine}")]
    Update {
        machine: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to check existence of machine {machine}")]
    Exists {
        machine: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to patch status of machine {machine}")]
    Patch {
        machine: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ActuatorError {
    /// Bad input rather than a failing collaborator.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Context(_) | Self::InvalidRole { .. })
    }

    /// The error and all of its sources, joined with `": "`.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}
