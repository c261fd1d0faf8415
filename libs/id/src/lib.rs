//! # machinery-id
//!
//! Typed identifiers for the machine lifecycle actuator.
//!
//! Every identifier is a ULID with a short resource prefix, rendered as
//! `{prefix}_{ulid}`:
//!
//! - `cl_01HV4Z2WQXKJNM8GPQY6VBKC3D` (cluster)
//! - `mach_01HV4Z3MXNKPQR9HSTZ7WCLD4E` (machine)
//! - `evt_01HV4Z4NYPLTRS0JTUA8XDME5F` (recorded lifecycle event)
//!
//! Parsing is strict: the prefix must match the type being parsed, so a
//! machine id can never be mistaken for a cluster id.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
