use {
    serde::Serialize,
    switchboard_messages::{Attachment, Direction},
};

/// A normalized webhook event, in payload order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalEvent {
    Message(MessageEvent),
    Status(StatusEvent),
}

impl CanonicalEvent {
    /// The id the event is about, for logging.
    #[must_use]
    pub fn message_id(&self) -> &str {
        match self {
            Self::Message(m) => &m.message_id,
            Self::Status(s) => &s.message_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageEvent {
    pub message_id: String,
    /// Provider-side alternate id (`meta_msg_id`), when present.
    pub correlation_id: Option<String>,
    pub sender: String,
    pub recipient: String,
    pub direction: Direction,
    /// Provider send time in epoch seconds.
    pub timestamp_secs: Option<i64>,
    pub body: String,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEvent {
    pub message_id: String,
    pub correlation_id: Option<String>,
    /// Provider status string, unvalidated (`sent`, `delivered`, `read`,
    /// `failed`, ...).
    pub status: String,
}
