use {
    serde_json::Value,
    switchboard_messages::Direction,
    tracing::{debug, trace},
};

use crate::{
    attachment::extract_attachment,
    event::{CanonicalEvent, MessageEvent, StatusEvent},
};

/// Envelope field used by the custom payload format.
pub const DEFAULT_WRAPPER_FIELD: &str = "metaData";

/// Normalize a webhook body into canonical events.
///
/// `wrapper_field` names the top-level field that may wrap the provider
/// envelope; an empty name disables unwrapping. Every `entry[*].changes[*]`
/// is visited in order. Shapes that do not match yield nothing; this never
/// fails.
pub fn normalize(payload: &Value, wrapper_field: &str) -> Vec<CanonicalEvent> {
    let envelope = unwrap_envelope(payload, wrapper_field);
    let mut events = Vec::new();

    for change in array(envelope, "entry")
        .iter()
        .flat_map(|entry| array(entry, "changes"))
    {
        let Some(value) = change.get("value").filter(|v| v.is_object()) else {
            trace!("change without an object value");
            continue;
        };
        let recipient = value
            .pointer("/metadata/phone_number_id")
            .and_then(Value::as_str)
            .unwrap_or_default();

        for message in array(value, "messages") {
            match message_event(message, recipient) {
                Some(event) => events.push(CanonicalEvent::Message(event)),
                None => debug!("skipping message element without id or sender"),
            }
        }
        for status in array(value, "statuses") {
            match status_event(status) {
                Some(event) => events.push(CanonicalEvent::Status(event)),
                None => debug!("skipping status element without id or status"),
            }
        }
    }

    events
}

/// The wrapper is unwrapped only when it holds an `entry` list; any other
/// value under that field leaves the payload as the envelope.
fn unwrap_envelope<'a>(payload: &'a Value, wrapper_field: &str) -> &'a Value {
    if wrapper_field.is_empty() {
        return payload;
    }
    match payload.get(wrapper_field) {
        Some(inner) if inner.get("entry").is_some_and(Value::is_array) => inner,
        _ => payload,
    }
}

/// `value[key]` as a slice; anything other than an array reads as empty.
fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn string(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Epoch seconds given as a JSON string or number.
fn timestamp_secs(value: &Value) -> Option<i64> {
    match value.get("timestamp")? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

fn message_event(message: &Value, recipient: &str) -> Option<MessageEvent> {
    let message_id = string(message, "id")?;
    let sender = string(message, "from")?;
    let body = message
        .pointer("/text/body")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(MessageEvent {
        correlation_id: string(message, "meta_msg_id").filter(|alt| *alt != message_id),
        message_id,
        sender,
        recipient: recipient.to_string(),
        direction: Direction::Inbound,
        timestamp_secs: timestamp_secs(message),
        body,
        attachment: extract_attachment(message),
    })
}

fn status_event(status: &Value) -> Option<StatusEvent> {
    let message_id = string(status, "id")?;
    Some(StatusEvent {
        correlation_id: string(status, "meta_msg_id").filter(|alt| *alt != message_id),
        message_id,
        status: string(status, "status")?,
    })
}
