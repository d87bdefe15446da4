//! Truncator - hard ceiling on finalized event size
//!
//! Stages, cheapest first:
//! 1. per-field char caps
//! 2. stack frame cap (first half + last half)
//! 3. measure serialized UTF-8 bytes; done if within the ceiling
//! 4. re-normalize payloads at progressively halved depth
//! 5. shrink the largest remaining strings, then drop payloads outright
//!
//! Stage 5 always terminates: every round either shortens a string or marks
//! it exhausted, and strings never grow.

use std::collections::HashSet;
use std::io;

use contracts::{ErrorPayload, Event, LimitsConfig};
use serde::Serialize;
use serde_json::Value as Json;
use tracing::{debug, instrument, warn};

use crate::markers::{self, cap_chars, ELLIPSIS};
use crate::normalize::Normalizer;

/// Upper bound on depth-reduction passes
const MAX_DEPTH_PASSES: usize = 5;

/// Top-level fields shrunk only as a last resort
const IDENTITY_FIELDS: &[&str] = &["id", "sessionId", "projectId", "eventType", "actorId"];

/// Never shrunk: must stay parseable
const FIXED_FIELDS: &[&str] = &["timestamp"];

/// Payload fields dropped when nothing else helps
const PAYLOAD_FIELDS: &[&str] = &["parameters", "response", "actorData"];

/// Size-bounding stage
#[derive(Debug, Clone, Default)]
pub struct Truncator {
    limits: LimitsConfig,
}

impl Truncator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Return a copy of `event` whose serialized form fits `max_event_bytes`
    #[instrument(name = "truncator_truncate", skip_all, fields(event_id = %event.id))]
    pub fn truncate(&self, event: &Event) -> Event {
        let max = self.limits.max_event_bytes;
        let mut out = event.clone();
        self.cap_fields(&mut out);
        self.cap_frames(&mut out);

        let mut size = serialized_len(&out);
        if size <= max {
            return out;
        }
        let original_size = size;

        let base = Normalizer::from_limits(&self.limits);
        let parameters = out.parameters.take();
        let response = out.response.take();
        let actor_data = out.actor_data.take();
        let mut depth = self.limits.max_depth;
        for _ in 0..MAX_DEPTH_PASSES {
            if depth == 0 {
                break;
            }
            depth /= 2;
            let normalizer = base.with_depth(depth);
            out.parameters = parameters.as_ref().map(|p| normalizer.renormalize(p));
            out.response = response.as_ref().map(|p| normalizer.renormalize(p));
            out.actor_data = actor_data.as_ref().map(|p| normalizer.renormalize(p));

            size = serialized_len(&out);
            if size <= max {
                debug!(original_size, size, depth, "Event fitted by depth reduction");
                return out;
            }
        }

        self.shrink(out, original_size)
    }

    fn cap_fields(&self, event: &mut Event) {
        let name = self.limits.max_name_length;
        let text = self.limits.max_text_length;
        let blob = self.limits.max_blob_length;

        cap(&mut event.id, name);
        cap(&mut event.session_id, name);
        cap(&mut event.event_type, name);
        for field in [
            &mut event.project_id,
            &mut event.resource_name,
            &mut event.actor_id,
            &mut event.actor_name,
            &mut event.client_name,
            &mut event.client_version,
            &mut event.server_name,
            &mut event.server_version,
        ] {
            cap_opt(field, name);
        }
        cap_opt(&mut event.user_intent, text);

        if let Some(error) = event.error.as_mut() {
            cap(&mut error.message, text);
            cap(&mut error.kind, name);
            cap_opt(&mut error.stack, blob);
            for frame in error.frames.iter_mut().flatten() {
                cap(&mut frame.filename, name);
                cap(&mut frame.function, name);
            }
        }
    }

    fn cap_frames(&self, event: &mut Event) {
        let max = self.limits.max_stack_frames;
        let Some(frames) = event.error.as_mut().and_then(|e| e.frames.as_mut()) else {
            return;
        };
        if frames.len() <= max {
            return;
        }
        let head = max / 2;
        let tail = max - head;
        frames.drain(head..frames.len() - tail);
    }

    /// Stage 5: shrink strings, then drop payloads, then shrink identity fields
    fn shrink(&self, event: Event, original_size: usize) -> Event {
        let max = self.limits.max_event_bytes;
        let mut doc = match serde_json::to_value(&event) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Event not serializable, dropping payloads");
                return strip_payloads(event);
            }
        };

        let mut size = shrink_strings(&mut doc, max, true);
        if size > max {
            if let Some(obj) = doc.as_object_mut() {
                for field in PAYLOAD_FIELDS {
                    obj.remove(*field);
                }
                if let Some(error) = obj.get_mut("error").and_then(Json::as_object_mut) {
                    error.remove("frames");
                }
            }
            warn!(original_size, max, "Payloads dropped to meet size ceiling");
            size = shrink_strings(&mut doc, max, false);
        }

        match serde_json::from_value::<Event>(doc) {
            Ok(out) => {
                debug!(original_size, size, "Event fitted by string truncation");
                out
            }
            Err(e) => {
                warn!(error = %e, "Shrunk event failed to decode, dropping payloads");
                strip_payloads(event)
            }
        }
    }
}

fn cap(s: &mut String, max: usize) {
    if s.len() > max {
        *s = cap_chars(s, max);
    }
}

fn cap_opt(s: &mut Option<String>, max: usize) {
    if let Some(s) = s.as_mut() {
        cap(s, max);
    }
}

fn strip_payloads(mut event: Event) -> Event {
    event.parameters = None;
    event.response = None;
    event.actor_data = None;
    if let Some(ErrorPayload { frames, .. }) = event.error.as_mut() {
        *frames = None;
    }
    event
}

/// Shrink the largest string leaves of `doc` until it fits `max` bytes or
/// nothing shrinkable remains. Returns the final serialized size.
fn shrink_strings(doc: &mut Json, max: usize, protect_identity: bool) -> usize {
    let mut size = serialized_len(doc);
    let mut exhausted = HashSet::new();

    while size > max {
        let Some((pointer, len)) = largest_string(doc, &exhausted, protect_identity) else {
            break;
        };
        let Some(Json::String(s)) = doc.pointer_mut(&pointer) else {
            break;
        };

        let overage = size - max;
        let keep = len.saturating_sub(overage + ELLIPSIS.len());
        let cut = markers::floor_bytes(s, keep);
        if cut.len() + ELLIPSIS.len() >= s.len() {
            exhausted.insert(pointer);
            continue;
        }
        *s = format!("{cut}{ELLIPSIS}");
        size = serialized_len(doc);
    }
    size
}

/// JSON pointer and byte length of the longest candidate string
fn largest_string(
    doc: &Json,
    exhausted: &HashSet<String>,
    protect_identity: bool,
) -> Option<(String, usize)> {
    let mut best: Option<(String, usize)> = None;
    let Json::Object(fields) = doc else {
        return None;
    };
    for (key, value) in fields {
        let skip = FIXED_FIELDS.contains(&key.as_str())
            || (protect_identity && IDENTITY_FIELDS.contains(&key.as_str()));
        if !skip {
            find_largest(value, &mut pointer_push("", key), exhausted, &mut best);
        }
    }
    best
}

fn find_largest(
    value: &Json,
    pointer: &mut String,
    exhausted: &HashSet<String>,
    best: &mut Option<(String, usize)>,
) {
    match value {
        Json::String(s) => {
            let larger = best.as_ref().is_none_or(|(_, len)| s.len() > *len);
            if larger && !exhausted.contains(pointer.as_str()) {
                *best = Some((pointer.clone(), s.len()));
            }
        }
        Json::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                find_largest(item, &mut pointer_push(pointer, &idx.to_string()), exhausted, best);
            }
        }
        Json::Object(map) => {
            for (key, item) in map {
                find_largest(item, &mut pointer_push(pointer, key), exhausted, best);
            }
        }
        _ => {}
    }
}

fn pointer_push(base: &str, token: &str) -> String {
    format!("{base}/{}", token.replace('~', "~0").replace('/', "~1"))
}

/// Serialized size in UTF-8 bytes, without buffering the output
pub fn serialized_len<T: Serialize + ?Sized>(value: &T) -> usize {
    let mut counter = ByteCounter(0);
    match serde_json::to_writer(&mut counter, value) {
        Ok(()) => counter.0,
        Err(_) => usize::MAX,
    }
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
