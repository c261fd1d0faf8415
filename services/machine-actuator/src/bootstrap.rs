//! Bootstrap credential issuance for joining machines.

use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::Utc;
use machinery_tokens::{BootstrapToken, BootstrapTokenSecret};
use tracing::debug;

use crate::clients::ClusterClient;

/// Default lifetime of a join token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

/// Issues single-use join credentials.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Create a fresh token valid for `ttl` and register it with the
    /// cluster behind `client`. Failures are returned, never retried.
    async fn new_bootstrap(&self, client: &dyn ClusterClient, ttl: Duration) -> Result<BootstrapToken>;
}

/// Issues kubeadm-style bootstrap tokens registered as secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeadmTokenIssuer;

#[async_trait]
impl TokenIssuer for KubeadmTokenIssuer {
    async fn new_bootstrap(&self, client: &dyn ClusterClient, ttl: Duration) -> Result<BootstrapToken> {
        let token = BootstrapToken::generate();
        let secret = BootstrapTokenSecret::new(&token, ttl, Utc::now())?;

        client
            .create_bootstrap_token_secret(&secret)
            .await
            .with_context(|| format!("failed to register bootstrap token {}", token.id()))?;

        debug!(
            token_id = %token.id(),
            expires_at = ?secret.expires_at(),
            "issued bootstrap token"
        );
        Ok(token)
    }
}
