//! Real-time WebSocket protocol definitions.
//!
//! All communication uses JSON text frames over `/ws`.
//!
//! Frame types:
//! - `ClientFrame`: client → server join/leave/ping
//! - `EventFrame`: server → client push (`message:new`, `message:update`, ...)

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

pub const PROTOCOL_VERSION: u32 = 1;
/// Client frames are tiny control messages; anything bigger is rejected.
pub const MAX_CLIENT_FRAME_BYTES: usize = 16_384;
/// Channel name that receives every conversation's events (inbox view).
pub const ALL_CONVERSATIONS: &str = "*";

// ── Event names ──────────────────────────────────────────────────────────────

pub mod events {
    pub const HELLO: &str = "hello";
    pub const MESSAGE_NEW: &str = "message:new";
    pub const MESSAGE_UPDATE: &str = "message:update";
    pub const JOINED: &str = "conversation:joined";
    pub const LEFT: &str = "conversation:left";
    pub const PONG: &str = "pong";
    pub const ERROR: &str = "error";
}

pub mod error_codes {
    pub const INVALID_FRAME: &str = "INVALID_FRAME";
    pub const FRAME_TOO_LARGE: &str = "FRAME_TOO_LARGE";
}

// ── Error shape ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ── Frames ───────────────────────────────────────────────────────────────────

/// Client → server control frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "join:conversation")]
    JoinConversation { conversation_id: String },
    #[serde(rename = "leave:conversation")]
    LeaveConversation { conversation_id: String },
    #[serde(rename = "ping")]
    Ping,
}

/// Server → client push event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub r#type: String, // always "event"
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Hub-wide broadcast sequence, increasing across all conversations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            r#type: "event".into(),
            event: event.into(),
            payload: Some(payload),
            seq: None,
        }
    }

    #[must_use]
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn error(error: ErrorShape) -> Self {
        Self::new(
            events::ERROR,
            serde_json::to_value(error).unwrap_or(serde_json::Value::Null),
        )
    }
}

/// Payload of the `hello` frame sent right after the upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    pub protocol: u32,
    pub conn_id: String,
    pub server_version: String,
}
