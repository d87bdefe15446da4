//! # Transform
//!
//! Event finalization stages.
//!
//! Responsibilities:
//! - Redact sensitive strings outside protected top-level fields
//! - Strip binary content from payloads
//! - Normalize arbitrary (possibly cyclic) values into JSON
//! - Enforce per-field caps and a hard serialized-size ceiling
//!
//! All stages share one traversal, [`visit::walk`], driven by a [`visit::Folder`].

pub mod markers;
pub mod normalize;
pub mod pipeline;
pub mod redact;
pub mod sanitize;
pub mod truncate;
pub mod visit;

pub use normalize::{normalize, Normalizer};
pub use pipeline::{new_event_id, EventPipeline};
pub use redact::{Redactor, PROTECTED_FIELDS};
pub use sanitize::{sanitize, Sanitizer};
pub use truncate::{serialized_len, Truncator};
pub use visit::WalkBounds;
