//! Machine lifecycle actuator.
//!
//! Drives cluster machines through Create, Update, Delete and Exists against
//! a virtualization backend. The first control-plane machine of a cluster
//! initializes the control plane; every other machine waits for it to come
//! online and joins with a short-lived bootstrap token.
//!
//! ## Architecture
//!
//! - **Context**: resolves cluster and machine config per operation and
//!   flushes staged status once on exit
//! - **Membership**: counts control-plane members and probes reachability
//! - **Bootstrap**: issues join tokens registered with the target cluster
//! - **Actuator**: the Create/Update/Delete/Exists state transitions
//!
//! Collaborators (object store, backend, cluster clients, probe, event
//! recorder) are traits in [`clients`], [`backend`] and [`bootstrap`];
//! in-memory implementations live in [`memory`].

pub mod actuator;
pub mod backend;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod membership;
pub mod memory;
pub mod model;
pub mod role;

// Re-export commonly used types
pub use actuator::{Actuator, Collaborators};
pub use backend::{ProvisionMode, ProvisioningBackend};
pub use config::{ActuatorConfig, Config};
pub use error::{ActuatorError, ActuatorResult, ContextError};
pub use model::{Cluster, Machine};
pub use role::Role;

pub use machinery_reconcile::Outcome;
