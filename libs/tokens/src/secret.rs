//! Registration record for a bootstrap token.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{BootstrapToken, TokenError};

/// Namespace bootstrap token records live in.
pub const BOOTSTRAP_TOKEN_NAMESPACE: &str = "kube-system";

/// Record type of bootstrap token secrets.
pub const BOOTSTRAP_TOKEN_SECRET_TYPE: &str = "bootstrap.kubernetes.io/token";

/// Group joining nodes are placed in.
pub const DEFAULT_NODE_TOKEN_GROUP: &str = "system:bootstrappers:kubeadm:default-node-token";

const KEY_TOKEN_ID: &str = "token-id";
const KEY_TOKEN_SECRET: &str = "token-secret";
const KEY_EXPIRATION: &str = "expiration";
const KEY_USAGE_AUTHENTICATION: &str = "usage-bootstrap-authentication";
const KEY_USAGE_SIGNING: &str = "usage-bootstrap-signing";
const KEY_EXTRA_GROUPS: &str = "auth-extra-groups";

/// Secret registering a bootstrap token with the target cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapTokenSecret {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub string_data: BTreeMap<String, String>,
    #[serde(skip)]
    expires_at: Option<DateTime<Utc>>,
}

impl BootstrapTokenSecret {
    /// Build the record for `token`, expiring `ttl` after `now`.
    pub fn new(token: &BootstrapToken, ttl: Duration, now: DateTime<Utc>) -> Result<Self, TokenError> {
        if ttl.is_zero() {
            return Err(TokenError::InvalidTtl(ttl));
        }
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(TokenError::InvalidTtl(ttl))?;

        let string_data = BTreeMap::from([
            (KEY_TOKEN_ID.to_string(), token.id().to_string()),
            (KEY_TOKEN_SECRET.to_string(), token.secret().to_string()),
            (
                KEY_EXPIRATION.to_string(),
                expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (KEY_USAGE_AUTHENTICATION.to_string(), "true".to_string()),
            (KEY_USAGE_SIGNING.to_string(), "true".to_string()),
            (KEY_EXTRA_GROUPS.to_string(), DEFAULT_NODE_TOKEN_GROUP.to_string()),
        ]);

        Ok(Self {
            name: secret_name(token.id()),
            namespace: BOOTSTRAP_TOKEN_NAMESPACE.to_string(),
            secret_type: BOOTSTRAP_TOKEN_SECRET_TYPE.to_string(),
            string_data,
            expires_at: Some(expires_at),
        })
    }

    pub fn token_id(&self) -> Option<&str> {
        self.string_data.get(KEY_TOKEN_ID).map(String::as_str)
    }

    /// Expiry of the token, read back from the record if needed.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at.or_else(|| {
            self.string_data
                .get(KEY_EXPIRATION)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
        })
    }

    /// A record without a readable expiry counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_none_or(|at| at <= now)
    }

    /// Whether `token` is the token this record registers.
    pub fn matches(&self, token: &BootstrapToken) -> bool {
        self.token_id() == Some(token.id())
            && self.string_data.get(KEY_TOKEN_SECRET).map(String::as_str) == Some(token.secret())
    }
}

/// Name of the secret for a given token id.
pub fn secret_name(token_id: &str) -> String {
    format!("bootstrap-token-{}", token_id)
}
