//! Configuration for the machine actuator.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use machinery_reconcile::{DEFAULT_JOIN_REQUEUE_AFTER, DEFAULT_MAX_RETRIES, DEFAULT_REQUEUE_AFTER};

use crate::bootstrap::DEFAULT_TOKEN_TTL;

/// Tunables of the lifecycle orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorConfig {
    /// Backoff while the cluster CA is missing.
    pub requeue_after: Duration,

    /// Backoff while a joiner waits for the control plane.
    pub join_requeue_after: Duration,

    /// Lifetime of issued join tokens.
    pub token_ttl: Duration,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            requeue_after: DEFAULT_REQUEUE_AFTER,
            join_requeue_after: DEFAULT_JOIN_REQUEUE_AFTER,
            token_ttl: DEFAULT_TOKEN_TTL,
        }
    }
}

/// Process configuration of the `machine-actuator` binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub actuator: ActuatorConfig,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// JSON topology to drive; built-in topology when unset.
    pub manifest: Option<PathBuf>,

    /// Fatal errors tolerated per machine before giving up on it.
    pub max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Unset keys take defaults,
    /// malformed values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ActuatorConfig::default();

        let actuator = ActuatorConfig {
            requeue_after: secs(&lookup, "MACHINERY_REQUEUE_AFTER_SECS", defaults.requeue_after)?,
            join_requeue_after: secs(
                &lookup,
                "MACHINERY_JOIN_REQUEUE_AFTER_SECS",
                defaults.join_requeue_after,
            )?,
            token_ttl: secs(&lookup, "MACHINERY_TOKEN_TTL_SECS", defaults.token_ttl)?,
        };
        if actuator.token_ttl.is_zero() {
            anyhow::bail!("MACHINERY_TOKEN_TTL_SECS must be greater than zero");
        }

        let log_level = lookup("MACHINERY_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let manifest = lookup("MACHINERY_MANIFEST").map(PathBuf::from);
        let max_retries = match lookup("MACHINERY_MAX_RETRIES") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("MACHINERY_MAX_RETRIES is not a number: {raw:?}"))?,
            None => DEFAULT_MAX_RETRIES,
        };

        Ok(Self {
            actuator,
            log_level,
            manifest,
            max_retries,
        })
    }
}

fn secs(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map(Duration::from_secs)
            .with_context(|| format!("{key} is not a number of seconds: {raw:?}")),
        None => Ok(default),
    }
}
