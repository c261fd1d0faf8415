//! Error types for bootstrap tokens.

use thiserror::Error;

/// Errors that can occur when parsing tokens or building their records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token is not in `<id>.<secret>` form.
    #[error("malformed bootstrap token: {0}")]
    Malformed(&'static str),

    /// The requested lifetime is zero or does not fit a timestamp.
    #[error("invalid token TTL: {0:?}")]
    InvalidTtl(std::time::Duration),
}
