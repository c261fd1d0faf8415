//! # machinery-events
//!
//! Human-readable outcome events for machine lifecycle operations.
//!
//! ## Design Principles
//!
//! - Every terminal Create/Update/Delete outcome produces exactly one event
//! - Recording is fire-and-forget: a recorder never returns an error and
//!   never blocks the operation that emits it
//! - Events name the object they are about via [`ObjectRef`]
//!
//! ## Recorders
//!
//! - [`TracingRecorder`]: writes events to the tracing pipeline
//! - [`MemoryRecorder`]: keeps events in memory for tests and local runs

mod event;
pub mod reasons;
mod recorder;

pub use event::*;
pub use recorder::*;
