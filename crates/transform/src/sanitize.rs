//! Sanitizer - strip binary content from payloads
//!
//! Tool results may embed base64 image/audio data or resource blobs. Those
//! are useless to analytics and would dominate the size budget, so they are
//! replaced with a marker before redaction runs.

use contracts::{LimitsConfig, Value};

use crate::markers;
use crate::visit::{walk, Container, Folder, WalkBounds};

const BINARY_CONTENT_TYPES: &[&str] = &["image", "audio"];

/// Return a copy of `value` with binary content replaced by a marker,
/// under the default bounds
pub fn sanitize(value: &Value) -> Value {
    Sanitizer::default().sanitize(value)
}

/// Binary-content stripper bound to a depth and node budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sanitizer {
    bounds: WalkBounds,
}

impl Sanitizer {
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self {
            bounds: WalkBounds::from_limits(limits),
        }
    }

    /// Rebuild `value` with binary blocks replaced
    ///
    /// The copy shares no containers with `value`.
    pub fn sanitize(&self, value: &Value) -> Value {
        walk(value, &mut Sanitize(self.bounds))
    }
}

struct Sanitize(WalkBounds);

impl Folder for Sanitize {
    type Output = Value;

    fn leaf(&mut self, value: &Value) -> Value {
        value.clone()
    }

    fn circular(&mut self, _kind: Container) -> Value {
        Value::from(markers::CIRCULAR)
    }

    fn collapsed(&mut self, kind: Container) -> Value {
        Value::from(kind.marker())
    }

    fn array(&mut self, items: Vec<Value>, _omitted: usize) -> Value {
        Value::array(items)
    }

    fn object(&mut self, mut entries: Vec<(String, Value)>, _omitted: usize) -> Value {
        let binary_block = entries.iter().any(|(key, value)| {
            key == "type"
                && value
                    .as_str()
                    .is_some_and(|t| BINARY_CONTENT_TYPES.contains(&t))
        });

        for (key, value) in entries.iter_mut() {
            let is_payload = (binary_block && key == "data") || key == "blob";
            if is_payload && value.as_str().is_some() {
                *value = Value::from(markers::BINARY_REMOVED);
            }
        }
        Value::object(entries)
    }

    fn max_depth(&self) -> usize {
        self.0.max_depth
    }

    fn max_nodes(&self) -> usize {
        self.0.max_nodes
    }
}
