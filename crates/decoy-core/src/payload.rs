//! Inbound payload normalization.
//!
//! Upstream callers use two request conventions and sometimes wrap requests
//! in an array. Normalization converts any of those shapes into a canonical
//! `(session_id, message, metadata)` tuple; a shape that cannot be
//! normalized is a normal outcome (an invalid payload), never an error.

use serde_json::{Map, Value};

/// The canonical form of an inbound request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedPayload {
    pub session_id: Option<String>,
    pub message: Option<String>,
    pub metadata: Map<String, Value>,
}

impl NormalizedPayload {
    /// A payload is usable only when both identifier and message text are
    /// present and non-empty.
    pub fn is_valid(&self) -> bool {
        self.session_id.as_deref().is_some_and(|s| !s.is_empty())
            && self.message.as_deref().is_some_and(|m| !m.is_empty())
    }

    fn invalid() -> Self {
        Self::default()
    }
}

/// Normalizes an arbitrary JSON payload.
///
/// Accepted shapes:
/// - `{"sessionId": "...", "message": "..." | {"text": "..."}, "metadata": {...}?}`
/// - `{"scenarioId": "...", "initialMessage": "..." | {"text": "..."}, "metadata": {...}?}`
/// - an array of either; the first element that yields a valid pair wins
pub fn normalize_payload(payload: &Value) -> NormalizedPayload {
    match payload {
        Value::Null => NormalizedPayload::invalid(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .map(extract_single)
            .find(NormalizedPayload::is_valid)
            .unwrap_or_else(NormalizedPayload::invalid),
        Value::Object(obj) => extract_single(obj),
        _ => NormalizedPayload::invalid(),
    }
}

fn extract_single(obj: &Map<String, Value>) -> NormalizedPayload {
    let metadata = obj
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if obj.contains_key("sessionId") {
        return NormalizedPayload {
            session_id: string_field(obj.get("sessionId")),
            message: message_field(obj.get("message")),
            metadata,
        };
    }

    if obj.contains_key("scenarioId") {
        return NormalizedPayload {
            session_id: string_field(obj.get("scenarioId")),
            message: message_field(obj.get("initialMessage")),
            metadata,
        };
    }

    NormalizedPayload {
        session_id: None,
        message: None,
        metadata,
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// A message may be a bare string or an object carrying a `text` field.
fn message_field(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => string_field(obj.get("text")),
        _ => None,
    }
}
