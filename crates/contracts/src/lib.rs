//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend only on this crate, never on each other's internals.
//!
//! ## Event model
//! - [`RawEvent`]: producer-side event, mutable, may carry a one-shot [`RedactFn`]
//! - [`Event`]: finalized event, redacted and size-bounded, JSON-safe payloads
//! - [`Value`]: host payload model with shared (possibly cyclic) containers

mod config;
mod error;
mod event;
mod redact_fn;
mod sink;
mod value;

pub use config::*;
pub use error::*;
pub use event::*;
pub use redact_fn::RedactFn;
pub use sink::*;
pub use value::{Array, Object, Value};
