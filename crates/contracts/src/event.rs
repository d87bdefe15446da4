//! Event types - producer input and finalized delivery output
//!
//! A [`RawEvent`] is created by instrumentation at call time and stays mutable
//! until the delivery queue finalizes it into an [`Event`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RedactFn, Value};

/// Producer-supplied event, prior to redaction and truncation
#[derive(Debug)]
pub struct RawEvent {
    /// Pre-assigned identifier; generated at finalization when absent
    pub id: Option<String>,
    pub session_id: String,
    pub project_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub event_type: String,
    pub resource_name: Option<String>,
    pub parameters: Option<Value>,
    pub response: Option<Value>,
    pub user_intent: Option<String>,
    pub is_error: bool,
    pub error: Option<ErrorPayload>,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub actor_data: Option<Value>,
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub server_name: Option<String>,
    pub server_version: Option<String>,
    /// One-shot redaction function, taken when the event is finalized
    pub redaction: Option<RedactFn>,
}

impl RawEvent {
    pub fn new(session_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            id: None,
            session_id: session_id.into(),
            project_id: None,
            timestamp: Utc::now(),
            duration_ms: None,
            event_type: event_type.into(),
            resource_name: None,
            parameters: None,
            response: None,
            user_intent: None,
            is_error: false,
            error: None,
            actor_id: None,
            actor_name: None,
            actor_data: None,
            client_name: None,
            client_version: None,
            server_name: None,
            server_version: None,
            redaction: None,
        }
    }

    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_user_intent(mut self, intent: impl Into<String>) -> Self {
        self.user_intent = Some(intent.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attach an error; also flags the event as failed
    pub fn with_error(mut self, error: ErrorPayload) -> Self {
        self.is_error = true;
        self.error = Some(error);
        self
    }

    pub fn with_redaction(mut self, redaction: RedactFn) -> Self {
        self.redaction = Some(redaction);
        self
    }

    /// Fill fields the producer left empty from externally derived session data
    pub fn merge_session(&mut self, session: &SessionInfo) {
        fill(&mut self.project_id, &session.project_id);
        fill(&mut self.actor_id, &session.actor_id);
        fill(&mut self.actor_name, &session.actor_name);
        fill(&mut self.client_name, &session.client_name);
        fill(&mut self.client_version, &session.client_version);
        fill(&mut self.server_name, &session.server_name);
        fill(&mut self.server_version, &session.server_version);
        if self.actor_data.is_none() {
            self.actor_data = session.actor_data.clone();
        }
    }
}

fn fill(slot: &mut Option<String>, source: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(source);
    }
}

/// Session and actor metadata derived outside the core
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    pub project_id: Option<String>,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub actor_data: Option<Value>,
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub server_name: Option<String>,
    pub server_version: Option<String>,
}

/// Finalized event: redacted, size-bounded, ready for sinks
///
/// Field names serialize in camelCase; these names are also the top-level
/// field names the redaction allowlist is keyed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "duration", default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_intent: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
}

/// Structured error attached to a failed call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<StackFrame>>,
}

impl ErrorPayload {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
            stack: None,
            frames: None,
        }
    }
}

/// One frame of a captured call stack, innermost last
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    pub filename: String,
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    #[serde(default)]
    pub in_app: bool,
}
