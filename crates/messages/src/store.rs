use {async_trait::async_trait, serde::Serialize, tokio::sync::broadcast};

use crate::{
    Result,
    model::{ConversationSummary, DeliveryState, MessageRecord, Page, StoreStats},
};

/// Outcome of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A message with the same id already exists; nothing was written.
    Duplicate,
}

/// Outcome of a conditional status update.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusApply {
    /// The stored delivery changed. Carries the record after the update.
    Applied(MessageRecord),
    /// The message exists but the update would not move it forward.
    Unchanged(MessageRecord),
    NotFound,
}

/// Identifies the message a status event refers to. Both ids are matched
/// against `message_id` and `correlation_id`; a `message_id` hit wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTarget {
    pub id: String,
    pub alt_id: Option<String>,
}

impl StatusTarget {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alt_id: None,
        }
    }

    #[must_use]
    pub fn with_alt(mut self, alt_id: Option<String>) -> Self {
        self.alt_id = alt_id.filter(|alt| *alt != self.id);
        self
    }
}

/// Who caused a write. Pipeline writes are announced by the pipeline itself;
/// everything else reaches subscribers through the change feed mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    Pipeline,
    Admin,
}

/// Entry on the store change feed.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    Inserted {
        origin: ChangeOrigin,
        record: MessageRecord,
    },
    Updated {
        origin: ChangeOrigin,
        record: MessageRecord,
    },
    Deleted {
        origin: ChangeOrigin,
        message_id: String,
    },
    Cleared {
        origin: ChangeOrigin,
    },
}

impl StoreChange {
    #[must_use]
    pub fn origin(&self) -> ChangeOrigin {
        match self {
            Self::Inserted { origin, .. }
            | Self::Updated { origin, .. }
            | Self::Deleted { origin, .. }
            | Self::Cleared { origin } => *origin,
        }
    }
}

/// Persistence for conversation history.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Round trip to the backing database.
    async fn ping(&self) -> Result<()>;

    /// Insert a message unless one with the same `message_id` exists.
    async fn insert(&self, record: &MessageRecord, origin: ChangeOrigin) -> Result<InsertOutcome>;

    /// Look a message up by `message_id`, falling back to `correlation_id`.
    /// The raw payload is not loaded.
    async fn find(&self, id: &str) -> Result<Option<MessageRecord>>;

    /// The audit copy of the webhook element a message was built from.
    async fn raw_payload(&self, message_id: &str) -> Result<Option<serde_json::Value>>;

    /// Move a message's delivery state forward in one atomic statement.
    ///
    /// The state never regresses and each timestamp is written at most once.
    async fn apply_status(
        &self,
        target: &StatusTarget,
        state: DeliveryState,
        at: i64,
        origin: ChangeOrigin,
    ) -> Result<StatusApply>;

    /// A page of a conversation's history in ascending time order. `skip`
    /// counts back from the newest message.
    async fn list_conversation(
        &self,
        conversation_id: &str,
        page: Page,
    ) -> Result<Vec<MessageRecord>>;

    /// One summary per conversation, most recently active first.
    async fn conversation_summaries(&self) -> Result<Vec<ConversationSummary>>;

    async fn stats(&self) -> Result<StoreStats>;

    async fn delete(&self, message_id: &str, origin: ChangeOrigin) -> Result<bool>;

    /// Delete every message. Returns the number of rows removed.
    async fn clear(&self, origin: ChangeOrigin) -> Result<u64>;

    /// Subscribe to committed writes.
    fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange>;
}
