//! Machine lifecycle actuator.
//!
//! The actuator drives one machine through Create, Update, Delete and
//! Exists. Create decides between two paths:
//!
//! - **Bootstrap**: the machine is a control-plane member and the only one
//!   in its cluster. It is created without a join token and initializes
//!   the control plane.
//! - **Join**: every other machine waits until the control plane is online,
//!   obtains a fresh bootstrap token from the cluster and is created with it.
//!
//! Unmet preconditions (missing CA material, control plane offline) end in
//! [`Outcome::RequeueAfter`], not in an error.
//!
//! Create, Update and Delete share one exit path ([`Actuator::finish`]): the
//! outcome is staged on the machine status, the status is patched once, and
//! exactly one event is recorded for a terminal outcome. Exists touches
//! neither the store nor the recorder.

use std::sync::Arc;

use machinery_events::{reasons, EventRecorder};
use machinery_reconcile::Outcome;
use tracing::{debug, info, instrument, warn};

use crate::backend::{ProvisionMode, ProvisioningBackend};
use crate::bootstrap::TokenIssuer;
use crate::clients::{ClusterClientFactory, ControlPlaneProbe, MachineStore};
use crate::config::ActuatorConfig;
use crate::context::{MachineContext, MachineContextParams};
use crate::error::{ActuatorError, ActuatorResult};
use crate::membership;
use crate::model::{Cluster, Machine, OperationKind};
use crate::role::Role;

/// Handles to every collaborator the actuator delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn MachineStore>,
    pub backend: Arc<dyn ProvisioningBackend>,
    pub clients: Arc<dyn ClusterClientFactory>,
    pub probe: Arc<dyn ControlPlaneProbe>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub recorder: Arc<dyn EventRecorder>,
}

/// Maintains machine objects.
pub struct Actuator {
    collaborators: Collaborators,
    config: ActuatorConfig,
}

impl Actuator {
    pub fn new(collaborators: Collaborators, config: ActuatorConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    pub fn config(&self) -> &ActuatorConfig {
        &self.config
    }

    /// Provision `machine`, bootstrapping or joining the control plane.
    #[instrument(skip_all, fields(op = "create", cluster = %cluster.name, machine = %machine.name))]
    pub async fn create(&self, cluster: &Cluster, machine: &Machine) -> ActuatorResult<Outcome> {
        let mut ctx = self.machine_context(cluster, machine)?;
        let result = self.create_machine(&mut ctx).await;
        self.finish(&mut ctx, OperationKind::Create, result).await
    }

    /// Destroy the backend VM of `machine`.
    #[instrument(skip_all, fields(op = "delete", cluster = %cluster.name, machine = %machine.name))]
    pub async fn delete(&self, cluster: &Cluster, machine: &Machine) -> ActuatorResult<Outcome> {
        let mut ctx = self.machine_context(cluster, machine)?;
        debug!("deleting machine");
        let result = self
            .collaborators
            .backend
            .delete(&mut ctx)
            .await
            .map(|()| Outcome::Completed)
            .map_err(|source| ActuatorError::Delete {
                machine: ctx.to_string(),
                source,
            });
        self.finish(&mut ctx, OperationKind::Delete, result).await
    }

    /// Refresh the recorded status of `machine` from the backend.
    #[instrument(skip_all, fields(op = "update", cluster = %cluster.name, machine = %machine.name))]
    pub async fn update(&self, cluster: &Cluster, machine: &Machine) -> ActuatorResult<Outcome> {
        let mut ctx = self.machine_context(cluster, machine)?;
        debug!("updating machine");
        let result = self
            .collaborators
            .backend
            .update(&mut ctx)
            .await
            .map(|()| Outcome::Completed)
            .map_err(|source| ActuatorError::Update {
                machine: ctx.to_string(),
                source,
            });
        self.finish(&mut ctx, OperationKind::Update, result).await
    }

    /// Whether the backend VM of `machine` exists. No side effects.
    #[instrument(skip_all, fields(op = "exists", cluster = %cluster.name, machine = %machine.name))]
    pub async fn exists(&self, cluster: &Cluster, machine: &Machine) -> ActuatorResult<bool> {
        let ctx = self.machine_context(cluster, machine)?;
        self.collaborators
            .backend
            .exists(&ctx)
            .await
            .map_err(|source| ActuatorError::Exists {
                machine: ctx.to_string(),
                source,
            })
    }

    fn machine_context(&self, cluster: &Cluster, machine: &Machine) -> ActuatorResult<MachineContext> {
        Ok(MachineContext::new(MachineContextParams {
            cluster,
            machine,
            store: Arc::clone(&self.collaborators.store),
        })?)
    }

    /// The Create decision sequence. Each step runs only if every earlier
    /// one passed.
    async fn create_machine(&self, ctx: &mut MachineContext) -> ActuatorResult<Outcome> {
        let role = ctx.role().map_err(|source| ActuatorError::InvalidRole {
            machine: ctx.to_string(),
            source,
        })?;
        debug!(role = %role, "creating machine");

        if !ctx.cluster.has_ca_key_pair() {
            info!(
                requeue_after_secs = self.config.requeue_after.as_secs(),
                "cluster config is missing the CA key pair, requeue machine"
            );
            return Ok(Outcome::RequeueAfter(self.config.requeue_after));
        }

        let members = membership::cluster_machines(ctx)
            .await
            .map_err(|source| ActuatorError::ListMachines {
                machine: ctx.to_string(),
                source,
            })?;

        match role {
            Role::ControlPlane if members.control_plane_count_including(&ctx.machine) == 1 => {
                if self.claim_control_plane_init(ctx).await? {
                    return self.init_control_plane(ctx).await;
                }
                info!("control plane initialization is claimed by another machine, joining instead");
            }
            Role::ControlPlane | Role::Worker => {}
        }

        self.join_control_plane(ctx).await
    }

    async fn claim_control_plane_init(&self, ctx: &MachineContext) -> ActuatorResult<bool> {
        self.collaborators
            .store
            .claim_control_plane_init(&ctx.cluster.cluster, &ctx.machine)
            .await
            .map_err(|source| ActuatorError::ClaimInit {
                machine: ctx.to_string(),
                source,
            })
    }

    async fn init_control_plane(&self, ctx: &mut MachineContext) -> ActuatorResult<Outcome> {
        info!("creating machine as initial member of the control plane");
        self.collaborators
            .backend
            .create(ctx, &ProvisionMode::Bootstrap)
            .await
            .map_err(|source| ActuatorError::InitControlPlane {
                machine: ctx.to_string(),
                source,
            })?;
        Ok(Outcome::Completed)
    }

    async fn join_control_plane(&self, ctx: &mut MachineContext) -> ActuatorResult<Outcome> {
        let online =
            membership::control_plane_online(self.collaborators.probe.as_ref(), &ctx.cluster).await;
        if !online {
            info!(
                requeue_after_secs = self.config.join_requeue_after.as_secs(),
                "unable to join machine to control plane until it is online"
            );
            return Ok(Outcome::RequeueAfter(self.config.join_requeue_after));
        }

        let client = self
            .collaborators
            .clients
            .client_for_cluster(&ctx.cluster)
            .await
            .map_err(|source| ActuatorError::ClusterClient {
                machine: ctx.to_string(),
                source,
            })?;

        let token = self
            .collaborators
            .tokens
            .new_bootstrap(client.as_ref(), self.config.token_ttl)
            .await
            .map_err(|source| ActuatorError::BootstrapToken {
                machine: ctx.to_string(),
                source,
            })?;

        info!(token_id = %token.id(), "joining machine to the control plane");
        self.collaborators
            .backend
            .create(ctx, &ProvisionMode::Join(token))
            .await
            .map_err(|source| ActuatorError::Join {
                machine: ctx.to_string(),
                source,
            })?;
        Ok(Outcome::Completed)
    }

    /// Common exit of Create, Update and Delete: stage the outcome, flush
    /// the status once, then report.
    async fn finish(
        &self,
        ctx: &mut MachineContext,
        kind: OperationKind,
        result: ActuatorResult<Outcome>,
    ) -> ActuatorResult<Outcome> {
        ctx.stage_last_operation(kind, &result);

        let result = match (ctx.patch().await, result) {
            (Ok(_), result) => result,
            (Err(source), Ok(_)) => Err(ActuatorError::Patch {
                machine: ctx.to_string(),
                source,
            }),
            (Err(patch_err), Err(err)) => {
                warn!(error = %patch_err, "failed to patch machine status");
                Err(err)
            }
        };

        self.report(ctx, kind, &result);
        result
    }

    /// Record the outcome event. Requeues are logged, not recorded.
    fn report(&self, ctx: &MachineContext, kind: OperationKind, result: &ActuatorResult<Outcome>) {
        let recorder = &self.collaborators.recorder;
        let object = ctx.object_ref();
        let (success, failure, past) = match kind {
            OperationKind::Create => (reasons::CREATE_SUCCESS, reasons::CREATE_FAILURE, "created"),
            OperationKind::Update => (reasons::UPDATE_SUCCESS, reasons::UPDATE_FAILURE, "updated"),
            OperationKind::Delete => (reasons::DELETE_SUCCESS, reasons::DELETE_FAILURE, "deleted"),
        };

        match result {
            Ok(Outcome::Completed) => {
                recorder.eventf(&object, success, format!("{} machine {:?}", past, ctx.to_string()));
            }
            Ok(Outcome::RequeueAfter(after)) => {
                debug!(requeue_after_secs = after.as_secs(), "{} requeued", kind);
            }
            Err(err) => {
                warn!(error = %err.chain(), "failed to {} machine", kind);
                recorder.warnf(
                    &object,
                    failure,
                    format!("failed to {} machine {:?}: {}", kind, ctx.to_string(), err.chain()),
                );
            }
        }
    }
}
