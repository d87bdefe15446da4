//! Redactor - rewrite sensitive strings before delivery
//!
//! Protection is decided by top-level field name only. A protected field keeps
//! its whole subtree untouched; a nested key that happens to share a protected
//! name is still redacted.
//!
//! Redaction runs in three steps so that no suspension happens while a tree is
//! being walked: collect the distinct strings, await the redaction function
//! once per string, then rebuild the values from the results. A string met
//! while rebuilding that was not collected means the payload changed in
//! between; the event is then rejected rather than delivered half redacted.

use std::collections::HashMap;

use contracts::{ContractError, ErrorPayload, LimitsConfig, RawEvent, RedactFn, Value};
use tracing::{debug, instrument, warn};

use crate::markers;
use crate::visit::{walk, Container, Folder, WalkBounds};

/// Top-level fields never passed through the redaction function
///
/// Actor identity is `actorId` alone. `actorName` and `actorData` are
/// user-supplied descriptions of the actor and are redacted like any other
/// field; add them with [`Redactor::with_protected`] to keep them verbatim.
pub const PROTECTED_FIELDS: &[&str] = &[
    "id",
    "sessionId",
    "projectId",
    "timestamp",
    "duration",
    "eventType",
    "resourceName",
    "isError",
    "actorId",
    "clientName",
    "clientVersion",
    "serverName",
    "serverVersion",
];

/// Applies a [`RedactFn`] to the unprotected parts of an event
#[derive(Debug, Clone)]
pub struct Redactor {
    protected: Vec<String>,
    bounds: WalkBounds,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::with_protected(PROTECTED_FIELDS.iter().copied())
    }
}

impl Redactor {
    pub fn with_protected<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected: fields.into_iter().map(Into::into).collect(),
            bounds: WalkBounds::default(),
        }
    }

    /// Bound payload walks by the depth and node budget of `limits`
    pub fn with_limits(mut self, limits: &LimitsConfig) -> Self {
        self.bounds = WalkBounds::from_limits(limits);
        self
    }

    pub fn is_protected(&self, field: &str) -> bool {
        self.protected.iter().any(|p| p == field)
    }

    /// Redact every unprotected string leaf of `raw`
    ///
    /// Payload containers are rebuilt rather than mutated, so values still
    /// shared with the producer are left as they were. Function-valued object
    /// properties are dropped.
    ///
    /// # Errors
    /// The first failure of `redact` aborts the whole event, as does a payload
    /// string that appeared after collection.
    #[instrument(name = "redactor_redact", skip_all, fields(event_type = %raw.event_type))]
    pub async fn redact(
        &self,
        mut raw: RawEvent,
        redact: &RedactFn,
    ) -> Result<RawEvent, ContractError> {
        let bounds = self.bounds;
        let mut table: HashMap<String, String> = HashMap::new();
        self.visit_unprotected(&mut raw, |field| match field {
            Field::Text(s) => {
                table.entry(s.clone()).or_default();
            }
            Field::Tree(v) => walk(
                v,
                &mut Collect {
                    table: &mut table,
                    bounds,
                },
            ),
        });

        for (original, replacement) in table.iter_mut() {
            *replacement = redact.call(original).await?;
        }
        debug!(strings = table.len(), "Strings redacted");

        let mut misses = 0;
        self.visit_unprotected(&mut raw, |field| match field {
            Field::Text(s) => {
                if let Some(replacement) = table.get(s.as_str()) {
                    s.clone_from(replacement);
                }
            }
            Field::Tree(v) => {
                let mut rewrite = Rewrite {
                    table: &table,
                    bounds,
                    misses: 0,
                };
                *v = walk(v, &mut rewrite);
                misses += rewrite.misses;
            }
        });

        if misses > 0 {
            warn!(misses, "Payload changed during redaction");
            return Err(ContractError::redaction(format!(
                "{misses} payload strings appeared during redaction"
            )));
        }
        Ok(raw)
    }

    /// Hand every field not on the allowlist to `visit`
    fn visit_unprotected<F>(&self, raw: &mut RawEvent, mut visit: F)
    where
        F: FnMut(Field<'_>),
    {
        let strings = [
            ("id", raw.id.as_mut()),
            ("sessionId", Some(&mut raw.session_id)),
            ("projectId", raw.project_id.as_mut()),
            ("eventType", Some(&mut raw.event_type)),
            ("resourceName", raw.resource_name.as_mut()),
            ("userIntent", raw.user_intent.as_mut()),
            ("actorId", raw.actor_id.as_mut()),
            ("actorName", raw.actor_name.as_mut()),
            ("clientName", raw.client_name.as_mut()),
            ("clientVersion", raw.client_version.as_mut()),
            ("serverName", raw.server_name.as_mut()),
            ("serverVersion", raw.server_version.as_mut()),
        ];
        for (field, slot) in strings {
            if let Some(s) = slot.filter(|_| !self.is_protected(field)) {
                visit(Field::Text(s));
            }
        }

        let values = [
            ("parameters", raw.parameters.as_mut()),
            ("response", raw.response.as_mut()),
            ("actorData", raw.actor_data.as_mut()),
        ];
        for (field, slot) in values {
            if let Some(v) = slot.filter(|_| !self.is_protected(field)) {
                visit(Field::Tree(v));
            }
        }

        if !self.is_protected("error") {
            if let Some(error) = raw.error.as_mut() {
                visit_error(error, &mut visit);
            }
        }
    }
}

/// A redactable top-level field
enum Field<'a> {
    Text(&'a mut String),
    Tree(&'a mut Value),
}

fn visit_error<F: FnMut(Field<'_>)>(error: &mut ErrorPayload, visit: &mut F) {
    visit(Field::Text(&mut error.message));
    visit(Field::Text(&mut error.kind));
    if let Some(stack) = error.stack.as_mut() {
        visit(Field::Text(stack));
    }
    for frame in error.frames.iter_mut().flatten() {
        visit(Field::Text(&mut frame.filename));
        visit(Field::Text(&mut frame.function));
    }
}

/// Records every string leaf
struct Collect<'a> {
    table: &'a mut HashMap<String, String>,
    bounds: WalkBounds,
}

impl Folder for Collect<'_> {
    type Output = ();

    fn leaf(&mut self, value: &Value) {
        if let Value::String(s) = value {
            self.table.entry(s.clone()).or_default();
        }
    }

    fn circular(&mut self, _kind: Container) {}

    fn collapsed(&mut self, _kind: Container) {}

    fn array(&mut self, _items: Vec<()>, _omitted: usize) {}

    fn object(&mut self, _entries: Vec<(String, ())>, _omitted: usize) {}

    fn max_depth(&self) -> usize {
        self.bounds.max_depth
    }

    fn max_nodes(&self) -> usize {
        self.bounds.max_nodes
    }

    fn skip_property(&self, value: &Value) -> bool {
        value.is_function()
    }
}

/// Rebuilds a value with string leaves replaced from the table
///
/// A string missing from the table is counted and never copied through.
struct Rewrite<'a> {
    table: &'a HashMap<String, String>,
    bounds: WalkBounds,
    misses: usize,
}

impl Folder for Rewrite<'_> {
    type Output = Value;

    fn leaf(&mut self, value: &Value) -> Value {
        match value {
            Value::String(s) => match self.table.get(s) {
                Some(replacement) => Value::String(replacement.clone()),
                None => {
                    self.misses += 1;
                    Value::Undefined
                }
            },
            other => other.clone(),
        }
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

    fn object(&mut self, entries: Vec<(String, Value)>, _omitted: usize) -> Value {
        Value::object(entries)
    }

    fn max_depth(&self) -> usize {
        self.bounds.max_depth
    }

    fn max_nodes(&self) -> usize {
        self.bounds.max_nodes
    }

    fn skip_property(&self, value: &Value) -> bool {
        value.is_function()
    }
}
