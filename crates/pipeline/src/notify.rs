use {
    async_trait::async_trait,
    serde::Serialize,
    switchboard_messages::{Delivery, DeliveryState, MessageRecord},
};

/// What the pipeline announces after a successful write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum MessageChange {
    NewMessage {
        conversation_id: String,
        message: MessageRecord,
    },
    StatusUpdated {
        conversation_id: String,
        message_id: String,
        status: DeliveryState,
        delivery: Delivery,
    },
}

impl MessageChange {
    #[must_use]
    pub fn new_message(message: MessageRecord) -> Self {
        Self::NewMessage {
            conversation_id: message.conversation_id.clone(),
            message,
        }
    }

    #[must_use]
    pub fn status_updated(record: &MessageRecord) -> Self {
        Self::StatusUpdated {
            conversation_id: record.conversation_id.clone(),
            message_id: record.message_id.clone(),
            status: record.delivery.state,
            delivery: record.delivery.clone(),
        }
    }

    #[must_use]
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::NewMessage {
                conversation_id, ..
            }
            | Self::StatusUpdated {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

/// Receives pipeline changes. Delivery is best effort; implementations must
/// not block on slow subscribers.
#[async_trait]
pub trait ChangePublisher: Send + Sync {
    async fn publish(&self, change: MessageChange);
}

/// Publisher for contexts without subscribers (batch processing).
pub struct NoopPublisher;

#[async_trait]
impl ChangePublisher for NoopPublisher {
    async fn publish(&self, _change: MessageChange) {}
}
