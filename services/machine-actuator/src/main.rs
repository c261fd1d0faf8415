//! Machine actuator development harness.
//!
//! Wires the actuator to in-memory collaborators and drives every machine
//! of a topology to existence, honouring requeues the way a reconcile
//! scheduler would.
//!
//! ## Loop
//!
//! - **Exists**: machines whose VM exists are done
//! - **Create**: everything else is created; outcomes are merged
//! - **Requeue**: sleep for the shortest requested backoff
//! - **Give up**: a machine whose fatal errors exhaust the retry budget is skipped

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use machinery_actuator::bootstrap::KubeadmTokenIssuer;
use machinery_actuator::memory::{MemoryBackend, MemoryClusterClients, MemoryStore};
use machinery_actuator::{Actuator, Collaborators, Config, Machine, Outcome};
use machinery_events::TracingRecorder;
use machinery_id::MachineId;
use machinery_reconcile::{RetryBudget, RetryVerdict, DEFAULT_RETRY_WINDOW};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod topology;

use topology::Topology;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting machine actuator harness");

    let topology = match &config.manifest {
        Some(path) => Topology::load(path)?,
        None => Topology::builtin(),
    };
    info!(
        cluster = %topology.cluster.name,
        namespace = %topology.cluster.namespace,
        machines = topology.machines.len(),
        requeue_after_secs = config.actuator.requeue_after.as_secs(),
        join_requeue_after_secs = config.actuator.join_requeue_after.as_secs(),
        "Configuration loaded"
    );

    let store = Arc::new(MemoryStore::new());
    for machine in &topology.machines {
        store.insert(machine.clone()).await;
    }
    let clients = Arc::new(MemoryClusterClients::new());
    let backend = Arc::new(MemoryBackend::new(Arc::clone(&clients)));

    let actuator = Actuator::new(
        Collaborators {
            store: store.clone(),
            backend: backend.clone(),
            clients,
            probe: backend.clone(),
            tokens: Arc::new(KubeadmTokenIssuer),
            recorder: Arc::new(TracingRecorder::new("machine-actuator")),
        },
        config.actuator.clone(),
    );

    let mut retries = RetryBudget::new(config.max_retries, DEFAULT_RETRY_WINDOW);

    loop {
        let mut next = Outcome::Completed;
        let mut pending = 0usize;
        let mut failed = false;

        retries.prune(Instant::now());

        for machine in store.machines().await {
            let key = format!("{}/{}", machine.namespace, machine.name);
            if retries.is_exhausted(&machine.uid, Instant::now()) {
                continue;
            }

            match actuator.exists(&topology.cluster, &machine).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    error!(machine = %key, error = %e.chain(), "Existence check failed");
                    failed = true;
                    record_failure(&mut retries, &machine, &key);
                    continue;
                }
            }

            pending += 1;
            match actuator.create(&topology.cluster, &machine).await {
                Ok(outcome) => {
                    retries.clear(&machine.uid);
                    next = next.merge(outcome);
                }
                Err(e) => {
                    error!(machine = %key, error = %e.chain(), "Create failed");
                    failed = true;
                    record_failure(&mut retries, &machine, &key);
                }
            }
        }

        if pending == 0 {
            break;
        }

        let pause = match next {
            Outcome::RequeueAfter(after) => after,
            Outcome::Completed if failed => actuator.config().requeue_after,
            Outcome::Completed => Duration::ZERO,
        };
        if !pause.is_zero() {
            info!(pending, pause_secs = pause.as_secs(), "Waiting before next pass");
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    return Ok(());
                }
            }
        }
    }

    info!(
        vms = backend.vm_count().await,
        patches = store.patch_count().await,
        "Harness finished"
    );
    Ok(())
}

/// Charge a hard failure against the machine's budget.
fn record_failure(retries: &mut RetryBudget<MachineId>, machine: &Machine, key: &str) {
    match retries.record_failure(machine.uid, Instant::now()) {
        RetryVerdict::Retry { attempt } => info!(machine = %key, attempt, "Will retry machine"),
        RetryVerdict::Exhausted => warn!(machine = %key, "Retries exhausted, giving up on machine"),
    }
}
