use {
    serde_json::Value,
    switchboard_common::time::{now_ms, secs_to_ms},
    switchboard_messages::{
        Attachment, ChangeOrigin, Delivery, DeliveryState, Direction, InsertOutcome,
        MessageRecord,
    },
    switchboard_metrics::{counter, pipeline as pipeline_metrics},
    switchboard_webhook::MessageEvent,
    tracing::{debug, info, warn},
    uuid::Uuid,
};

use crate::{
    Pipeline,
    error::{Error, Result},
    notify::MessageChange,
};

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The message was new. Carries the stored record without its raw payload.
    Stored(MessageRecord),
    Duplicate,
}

impl Pipeline {
    /// Store a message event unless its id is already known. `raw_payload`
    /// is the webhook body the event came from, kept for audit.
    pub async fn ingest(
        &self,
        event: MessageEvent,
        raw_payload: Option<&Value>,
    ) -> Result<IngestOutcome> {
        let record = build_record(event, raw_payload.cloned(), now_ms());

        match self
            .bounded(self.store.insert(&record, ChangeOrigin::Pipeline))
            .await?
        {
            InsertOutcome::Duplicate => {
                counter!(pipeline_metrics::MESSAGES_DUPLICATE_TOTAL).increment(1);
                info!(message_id = %record.message_id, "message already stored, skipping");
                Ok(IngestOutcome::Duplicate)
            },
            InsertOutcome::Inserted => {
                counter!(
                    pipeline_metrics::MESSAGES_STORED_TOTAL,
                    "direction" => record.direction.as_str()
                )
                .increment(1);
                debug!(
                    message_id = %record.message_id,
                    conversation_id = %record.conversation_id,
                    "message stored"
                );

                let mut stored = record;
                stored.raw_payload = None;
                self.publisher
                    .publish(MessageChange::new_message(stored.clone()))
                    .await;
                self.replay_pending(&stored).await;
                Ok(IngestOutcome::Stored(stored))
            },
        }
    }

    /// Record a message sent from this side of the conversation.
    pub async fn send_outbound(
        &self,
        conversation_id: &str,
        text: Option<String>,
        attachment: Option<Attachment>,
    ) -> Result<MessageRecord> {
        let body = text.unwrap_or_default();
        if body.trim().is_empty() && attachment.is_none() {
            return Err(Error::EmptyMessage);
        }

        let message_id = format!("msg_{}", Uuid::new_v4().simple());
        let event = MessageEvent {
            message_id: message_id.clone(),
            correlation_id: None,
            sender: self.config.outbound_sender.clone(),
            recipient: conversation_id.to_string(),
            direction: Direction::Outbound,
            timestamp_secs: None,
            body,
            attachment,
        };

        match self.ingest(event, None).await? {
            IngestOutcome::Stored(record) => Ok(record),
            IngestOutcome::Duplicate => Err(switchboard_messages::Error::corrupt(
                message_id,
                "generated message id already exists",
            )
            .into()),
        }
    }

    /// Reconcile buffered status events that were waiting for `record`.
    async fn replay_pending(&self, record: &MessageRecord) {
        let Some(pending) = &self.pending else {
            return;
        };
        let ids: Vec<&str> = std::iter::once(record.message_id.as_str())
            .chain(record.correlation_id.as_deref())
            .collect();
        let waiting = pending.lock().await.take_matching(&ids);

        for event in waiting {
            counter!(pipeline_metrics::STATUSES_REPLAYED_TOTAL).increment(1);
            debug!(message_id = %record.message_id, status = %event.status, "replaying buffered status");
            if let Err(e) = self.reconcile_once(&event).await {
                warn!(message_id = %record.message_id, error = %e, "buffered status replay failed");
            }
        }
    }
}

/// Build the stored form of an event. Inbound messages are delivered on
/// arrival; outbound ones start as sent.
pub(crate) fn build_record(
    event: MessageEvent,
    raw_payload: Option<Value>,
    now: i64,
) -> MessageRecord {
    let (conversation_id, created_at, delivery) = match event.direction {
        Direction::Inbound => {
            let created_at = event.timestamp_secs.map_or(now, secs_to_ms);
            (event.sender.clone(), created_at, Delivery {
                state: DeliveryState::Delivered,
                sent_at: created_at,
                delivered_at: Some(now),
                read_at: None,
            })
        },
        Direction::Outbound => (event.recipient.clone(), now, Delivery::sent(now)),
    };

    MessageRecord {
        message_id: event.message_id,
        correlation_id: event.correlation_id,
        conversation_id,
        sender: event.sender,
        recipient: event.recipient,
        body: event.body,
        attachment: event.attachment,
        created_at,
        direction: event.direction,
        delivery,
        raw_payload,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{RecordingPublisher, memory_store, pipeline_with},
        serde_json::json,
        std::sync::Arc,
        switchboard_messages::AttachmentKind,
    };

    fn inbound_event(id: &str, from: &str, ts: Option<i64>) -> MessageEvent {
        MessageEvent {
            message_id: id.into(),
            correlation_id: None,
            sender: from.into(),
            recipient: "sys".into(),
            direction: Direction::Inbound,
            timestamp_secs: ts,
            body: "hello".into(),
            attachment: None,
        }
    }

    #[test]
    fn inbound_record_uses_event_time() {
        let record = build_record(inbound_event("m1", "111", Some(1000)), None, 5_000_000);
        assert_eq!(record.conversation_id, "111");
        assert_eq!(record.created_at, 1_000_000);
        assert_eq!(record.delivery.sent_at, 1_000_000);
        assert_eq!(record.delivery.delivered_at, Some(5_000_000));
        assert_eq!(record.delivery.state, DeliveryState::Delivered);
    }

    #[test]
    fn inbound_without_timestamp_uses_now() {
        let record = build_record(inbound_event("m1", "111", None), None, 7);
        assert_eq!(record.created_at, 7);
    }

    #[test]
    fn outbound_record_is_sent_to_recipient() {
        let mut event = inbound_event("o1", "system", Some(1000));
        event.direction = Direction::Outbound;
        event.recipient = "222".into();
        let record = build_record(event, None, 9_000);
        assert_eq!(record.conversation_id, "222");
        assert_eq!(record.created_at, 9_000);
        assert_eq!(record.delivery, Delivery::sent(9_000));
    }

    #[tokio::test]
    async fn ingest_twice_yields_duplicate() {
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = pipeline_with(memory_store().await, publisher.clone());

        let body = json!({ "metaData": { "_id": "abc", "entry": [] } });
        let first = pipeline
            .ingest(inbound_event("m1", "111", Some(1000)), Some(&body))
            .await
            .unwrap();
        let IngestOutcome::Stored(stored) = first else {
            panic!("first ingest must store");
        };
        assert_eq!(stored.raw_payload, None);
        assert_eq!(
            pipeline.store().raw_payload("m1").await.unwrap(),
            Some(body.clone())
        );

        let second = pipeline
            .ingest(inbound_event("m1", "111", Some(1000)), Some(&body))
            .await
            .unwrap();
        assert_eq!(second, IngestOutcome::Duplicate);
        assert_eq!(publisher.changes().len(), 1);
    }

    #[tokio::test]
    async fn send_outbound_requires_content() {
        let pipeline = pipeline_with(memory_store().await, Arc::new(RecordingPublisher::default()));
        assert!(matches!(
            pipeline.send_outbound("111", Some("   ".into()), None).await,
            Err(Error::EmptyMessage)
        ));
        assert!(matches!(
            pipeline.send_outbound("111", None, None).await,
            Err(Error::EmptyMessage)
        ));
    }

    #[tokio::test]
    async fn send_outbound_records_sender_and_attachment() {
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = pipeline_with(memory_store().await, publisher.clone());

        let record = pipeline
            .send_outbound(
                "111",
                None,
                Some(Attachment {
                    kind: AttachmentKind::Image,
                    external_ref: "media-1".into(),
                    filename: None,
                    caption: None,
                    mime_type: None,
                }),
            )
            .await
            .unwrap();
        assert!(record.message_id.starts_with("msg_"));
        assert_eq!(record.sender, "system");
        assert_eq!(record.recipient, "111");
        assert_eq!(record.conversation_id, "111");
        assert_eq!(record.direction, Direction::Outbound);
        assert_eq!(record.delivery.state, DeliveryState::Sent);

        let changes = publisher.changes();
        assert!(matches!(
            &changes[0],
            MessageChange::NewMessage { message, .. } if message.message_id == record.message_id
        ));
    }
}
