//! Per-conversation fan-out of pipeline changes to WebSocket clients.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use {
    async_trait::async_trait,
    switchboard_metrics::{counter, realtime},
    switchboard_pipeline::{ChangePublisher, MessageChange},
    switchboard_protocol::{ALL_CONVERSATIONS, EventFrame, events},
    tokio::sync::{RwLock, mpsc},
    tracing::{debug, warn},
};

struct Subscriber {
    conn_id: String,
    sender: mpsc::UnboundedSender<String>,
}

/// Subscriptions keyed by conversation id. The [`ALL_CONVERSATIONS`] channel
/// receives every change.
#[derive(Default)]
pub struct ConversationHub {
    channels: RwLock<HashMap<String, Vec<Subscriber>>>,
    seq: AtomicU64,
}

impl ConversationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a conversation. Joining twice is a no-op.
    pub async fn join(
        &self,
        conversation_id: &str,
        conn_id: &str,
        sender: mpsc::UnboundedSender<String>,
    ) -> bool {
        let mut channels = self.channels.write().await;
        let subscribers = channels.entry(conversation_id.to_string()).or_default();
        if subscribers.iter().any(|s| s.conn_id == conn_id) {
            return false;
        }
        subscribers.push(Subscriber {
            conn_id: conn_id.to_string(),
            sender,
        });
        debug!(conversation_id, conn_id, total = subscribers.len(), "hub: joined");
        true
    }

    pub async fn leave(&self, conversation_id: &str, conn_id: &str) -> bool {
        let mut channels = self.channels.write().await;
        let Some(subscribers) = channels.get_mut(conversation_id) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|s| s.conn_id != conn_id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            channels.remove(conversation_id);
        }
        removed
    }

    /// Drop every subscription held by a connection.
    pub async fn leave_all(&self, conn_id: &str) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, subscribers| {
            subscribers.retain(|s| s.conn_id != conn_id);
            !subscribers.is_empty()
        });
    }

    /// Send an event to a conversation's subscribers and to the
    /// [`ALL_CONVERSATIONS`] channel. Closed senders are pruned. Returns the
    /// number of frames delivered.
    pub async fn broadcast(
        &self,
        conversation_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> usize {
        // Hold the write lock across sequencing and sending so frames reach
        // every subscriber in one global order.
        let mut channels = self.channels.write().await;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = match serde_json::to_string(&EventFrame::new(event, payload).with_seq(seq)) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "hub: failed to serialize frame");
                return 0;
            },
        };

        let mut delivered = 0;
        let targets: &[&str] = if conversation_id == ALL_CONVERSATIONS {
            &[ALL_CONVERSATIONS]
        } else {
            &[conversation_id, ALL_CONVERSATIONS]
        };
        for target in targets {
            let Some(subscribers) = channels.get_mut(*target) else {
                continue;
            };
            let before = subscribers.len();
            subscribers.retain(|s| s.sender.send(frame.clone()).is_ok());
            let pruned = before - subscribers.len();
            delivered += subscribers.len();
            if pruned > 0 {
                counter!(realtime::SUBSCRIBERS_PRUNED_TOTAL).increment(pruned as u64);
                debug!(conversation_id = *target, pruned, "hub: dropped closed subscribers");
            }
            if subscribers.is_empty() {
                channels.remove(*target);
            }
        }
        counter!(realtime::FRAMES_SENT_TOTAL).increment(delivered as u64);
        delivered
    }

    pub async fn subscriber_count(&self, conversation_id: &str) -> usize {
        self.channels
            .read()
            .await
            .get(conversation_id)
            .map_or(0, Vec::len)
    }

    /// Subscriptions across all conversations.
    pub async fn total_subscriptions(&self) -> usize {
        self.channels.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl ChangePublisher for ConversationHub {
    async fn publish(&self, change: MessageChange) {
        let event = match change {
            MessageChange::NewMessage { .. } => events::MESSAGE_NEW,
            MessageChange::StatusUpdated { .. } => events::MESSAGE_UPDATE,
        };
        let payload = match serde_json::to_value(&change) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "hub: failed to serialize change");
                return;
            },
        };
        self.broadcast(change.conversation_id(), event, payload).await;
    }
}
