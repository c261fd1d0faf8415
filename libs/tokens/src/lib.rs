//! # machinery-tokens
//!
//! Short-lived bootstrap tokens that let a new node join a running
//! control plane.
//!
//! Token format: `<id>.<secret>`, where `id` is 6 and `secret` is 16
//! characters from `[a-z0-9]`. The id is public and names the
//! registration record; the secret authenticates the joiner.
//!
//! A token is only useful once its [`BootstrapTokenSecret`] has been
//! registered with the target cluster. The record carries the expiry, so
//! the cluster itself garbage-collects stale tokens.

mod error;
mod secret;
mod token;

pub use error::TokenError;
pub use secret::*;
pub use token::*;
