#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use {
    async_trait::async_trait,
    sqlx::sqlite::SqlitePoolOptions,
    switchboard_messages::{
        ChangeOrigin, ConversationSummary, Delivery, DeliveryState, Direction, InsertOutcome,
        MessageRecord, MessageStore, Page, SqliteMessageStore, StatusApply, StatusTarget,
        StoreChange, StoreStats,
    },
    tokio::sync::broadcast,
};

use crate::{ChangePublisher, MessageChange, Pipeline, PipelineConfig};

pub(crate) async fn memory_store() -> Arc<dyn MessageStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    switchboard_messages::run_migrations(&pool).await.unwrap();
    Arc::new(SqliteMessageStore::new(pool))
}

pub(crate) fn pipeline_with(
    store: Arc<dyn MessageStore>,
    publisher: Arc<RecordingPublisher>,
) -> Pipeline {
    Pipeline::new(store, publisher, PipelineConfig::default())
}

pub(crate) fn outbound_record(id: &str, to: &str) -> MessageRecord {
    MessageRecord {
        message_id: id.into(),
        correlation_id: None,
        conversation_id: to.into(),
        sender: "system".into(),
        recipient: to.into(),
        body: "hello".into(),
        attachment: None,
        created_at: 1_000,
        direction: Direction::Outbound,
        delivery: Delivery::sent(1_000),
        raw_payload: None,
    }
}

#[derive(Default)]
pub(crate) struct RecordingPublisher {
    changes: Mutex<Vec<MessageChange>>,
}

impl RecordingPublisher {
    pub(crate) fn changes(&self) -> Vec<MessageChange> {
        self.changes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangePublisher for RecordingPublisher {
    async fn publish(&self, change: MessageChange) {
        self.changes.lock().unwrap().push(change);
    }
}

/// A store whose every operation hangs.
pub(crate) struct StalledStore;

#[async_trait]
impl MessageStore for StalledStore {
    async fn ping(&self) -> switchboard_messages::Result<()> {
        std::future::pending().await
    }

    async fn insert(
        &self,
        _record: &MessageRecord,
        _origin: ChangeOrigin,
    ) -> switchboard_messages::Result<InsertOutcome> {
        std::future::pending().await
    }

    async fn find(&self, _id: &str) -> switchboard_messages::Result<Option<MessageRecord>> {
        std::future::pending().await
    }

    async fn raw_payload(
        &self,
        _message_id: &str,
    ) -> switchboard_messages::Result<Option<serde_json::Value>> {
        std::future::pending().await
    }

    async fn apply_status(
        &self,
        _target: &StatusTarget,
        _state: DeliveryState,
        _at: i64,
        _origin: ChangeOrigin,
    ) -> switchboard_messages::Result<StatusApply> {
        std::future::pending().await
    }

    async fn list_conversation(
        &self,
        _conversation_id: &str,
        _page: Page,
    ) -> switchboard_messages::Result<Vec<MessageRecord>> {
        std::future::pending().await
    }

    async fn conversation_summaries(
        &self,
    ) -> switchboard_messages::Result<Vec<ConversationSummary>> {
        std::future::pending().await
    }

    async fn stats(&self) -> switchboard_messages::Result<StoreStats> {
        std::future::pending().await
    }

    async fn delete(
        &self,
        _message_id: &str,
        _origin: ChangeOrigin,
    ) -> switchboard_messages::Result<bool> {
        std::future::pending().await
    }

    async fn clear(&self, _origin: ChangeOrigin) -> switchboard_messages::Result<u64> {
        std::future::pending().await
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        broadcast::channel(1).1
    }
}
