//! Token generation and parsing.

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::TokenError;

/// Length of the public token id.
pub const TOKEN_ID_LEN: usize = 6;

/// Length of the token secret.
pub const TOKEN_SECRET_LEN: usize = 16;

const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A bootstrap join token.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapToken {
    id: String,
    secret: String,
}

impl BootstrapToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        Self {
            id: random_string(&mut rng, TOKEN_ID_LEN),
            secret: random_string(&mut rng, TOKEN_SECRET_LEN),
        }
    }

    /// Parse a token in `<id>.<secret>` form.
    pub fn parse(s: &str) -> Result<Self, TokenError> {
        let (id, secret) = s
            .split_once('.')
            .ok_or(TokenError::Malformed("missing '.' separator"))?;

        if id.len() != TOKEN_ID_LEN || !is_token_chars(id) {
            return Err(TokenError::Malformed("token id must be 6 characters of [a-z0-9]"));
        }
        if secret.len() != TOKEN_SECRET_LEN || !is_token_chars(secret) {
            return Err(TokenError::Malformed(
                "token secret must be 16 characters of [a-z0-9]",
            ));
        }

        Ok(Self {
            id: id.to_string(),
            secret: secret.to_string(),
        })
    }

    /// Public token id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// SHA-256 of the full token, hex encoded. Safe to log.
    pub fn hash(&self) -> String {
        let digest = Sha256::digest(self.to_string().as_bytes());
        hex::encode(digest)
    }
}

fn random_string(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| TOKEN_CHARSET[rng.random_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}

fn is_token_chars(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

impl std::fmt::Debug for BootstrapToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        f.debug_struct("BootstrapToken")
            .field("id", &self.id)
            .field("hash", &self.hash())
            .finish()
    }
}

impl std::fmt::Display for BootstrapToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.id, self.secret)
    }
}

impl std::str::FromStr for BootstrapToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
