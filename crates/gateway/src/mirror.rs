//! Forwards store writes made outside the pipeline to WebSocket subscribers.

use std::sync::Arc;

use {
    switchboard_messages::{ChangeOrigin, StoreChange},
    switchboard_pipeline::{ChangePublisher, MessageChange},
    tokio::{
        sync::broadcast::{Receiver, error::RecvError},
        task::JoinHandle,
    },
    tracing::{debug, warn},
};

use crate::hub::ConversationHub;

/// Spawn the mirror task. It ends when the store's change feed closes.
pub fn spawn_change_mirror(
    mut changes: Receiver<StoreChange>,
    hub: Arc<ConversationHub>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => mirror_change(&hub, change).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change mirror lagged behind the store feed");
                },
                Err(RecvError::Closed) => break,
            }
        }
        debug!("change mirror stopped");
    })
}

/// Pipeline writes were already announced inline; only the rest is forwarded.
async fn mirror_change(hub: &ConversationHub, change: StoreChange) {
    if change.origin() == ChangeOrigin::Pipeline {
        return;
    }
    match change {
        StoreChange::Inserted { record, .. } => {
            hub.publish(MessageChange::new_message(record)).await;
        },
        StoreChange::Updated { record, .. } => {
            hub.publish(MessageChange::status_updated(&record)).await;
        },
        StoreChange::Deleted { message_id, .. } => {
            debug!(%message_id, "change mirror: delete not forwarded");
        },
        StoreChange::Cleared { .. } => debug!("change mirror: clear not forwarded"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        switchboard_messages::{Delivery, Direction, MessageRecord},
        switchboard_protocol::ALL_CONVERSATIONS,
        tokio::sync::{broadcast, mpsc},
    };

    fn record(id: &str) -> MessageRecord {
        MessageRecord {
            message_id: id.into(),
            correlation_id: None,
            conversation_id: "111".into(),
            sender: "111".into(),
            recipient: "sys".into(),
            body: String::new(),
            attachment: None,
            created_at: 1,
            direction: Direction::Inbound,
            delivery: Delivery::delivered(1),
            raw_payload: None,
        }
    }

    #[tokio::test]
    async fn forwards_admin_writes_only() {
        let hub = Arc::new(ConversationHub::new());
        let (sub_tx, mut sub_rx) = mpsc::unbounded_channel();
        hub.join(ALL_CONVERSATIONS, "watcher", sub_tx).await;

        let (feed, rx) = broadcast::channel(16);
        let task = spawn_change_mirror(rx, Arc::clone(&hub));

        feed.send(StoreChange::Inserted {
            origin: ChangeOrigin::Pipeline,
            record: record("from-pipeline"),
        })
        .unwrap();
        feed.send(StoreChange::Inserted {
            origin: ChangeOrigin::Admin,
            record: record("seeded"),
        })
        .unwrap();
        drop(feed);
        task.await.unwrap();

        let frame: serde_json::Value = serde_json::from_str(&sub_rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["payload"]["message"]["messageId"], "seeded");
        assert!(sub_rx.try_recv().is_err());
    }
}
