use {
    switchboard_common::time::now_ms,
    switchboard_messages::{ChangeOrigin, DeliveryState, MessageRecord, StatusApply, StatusTarget},
    switchboard_metrics::{counter, pipeline as pipeline_metrics},
    switchboard_webhook::StatusEvent,
    tracing::{debug, info},
};

use crate::{
    Pipeline,
    error::{Error, Result},
    notify::MessageChange,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Updated(MessageRecord),
    /// The event would not move the message forward.
    Unchanged(MessageRecord),
    NotFound,
    /// A provider status outside sent/delivered/read, e.g. `failed`.
    UnsupportedState(String),
}

impl Pipeline {
    /// Apply a status event. Unknown targets are buffered when the pending
    /// buffer is enabled.
    pub async fn reconcile(&self, event: &StatusEvent) -> Result<ReconcileOutcome> {
        let mut outcome = self.reconcile_once(event).await?;
        if outcome == ReconcileOutcome::NotFound
            && let Some(pending) = &self.pending
        {
            if let Some(evicted) = pending.lock().await.push(event.clone()) {
                debug!(message_id = %evicted.message_id, "pending status evicted");
            }
            counter!(pipeline_metrics::STATUSES_BUFFERED_TOTAL).increment(1);

            // The message may have been stored, and the buffer drained, between
            // the miss and the push. A repeat application is harmless.
            outcome = self.reconcile_once(event).await?;
            if outcome != ReconcileOutcome::NotFound {
                pending.lock().await.take_matching(&[event.message_id.as_str()]);
            }
        }

        if outcome == ReconcileOutcome::NotFound {
            counter!(pipeline_metrics::STATUSES_UNMATCHED_TOTAL).increment(1);
            info!(
                message_id = %event.message_id,
                status = %event.status,
                buffered = self.pending.is_some(),
                "status for unknown message"
            );
        }
        Ok(outcome)
    }

    /// Set a message's state directly, bypassing the buffer.
    pub async fn set_status(&self, id: &str, state: &str) -> Result<ReconcileOutcome> {
        let state: DeliveryState = state
            .parse()
            .map_err(|_| Error::InvalidState(state.to_string()))?;
        self.apply_state(&StatusTarget::new(id), state).await
    }

    pub(crate) async fn reconcile_once(&self, event: &StatusEvent) -> Result<ReconcileOutcome> {
        let Ok(state) = event.status.parse::<DeliveryState>() else {
            info!(
                message_id = %event.message_id,
                status = %event.status,
                "unsupported status dropped"
            );
            return Ok(ReconcileOutcome::UnsupportedState(event.status.clone()));
        };
        let target = StatusTarget::new(&event.message_id).with_alt(event.correlation_id.clone());
        self.apply_state(&target, state).await
    }

    async fn apply_state(
        &self,
        target: &StatusTarget,
        state: DeliveryState,
    ) -> Result<ReconcileOutcome> {
        let applied = self
            .bounded(
                self.store
                    .apply_status(target, state, now_ms(), ChangeOrigin::Pipeline),
            )
            .await?;

        Ok(match applied {
            StatusApply::Applied(record) => {
                counter!(pipeline_metrics::STATUSES_APPLIED_TOTAL, "state" => state.as_str())
                    .increment(1);
                debug!(
                    message_id = %record.message_id,
                    conversation_id = %record.conversation_id,
                    state = %record.delivery.state,
                    "status applied"
                );
                self.publisher
                    .publish(MessageChange::status_updated(&record))
                    .await;
                ReconcileOutcome::Updated(record)
            },
            StatusApply::Unchanged(record) => {
                counter!(pipeline_metrics::STATUSES_UNCHANGED_TOTAL).increment(1);
                debug!(
                    message_id = %record.message_id,
                    current = %record.delivery.state,
                    incoming = %state,
                    "status unchanged"
                );
                ReconcileOutcome::Unchanged(record)
            },
            StatusApply::NotFound => {
                debug!(message_id = %target.id, state = %state, "no message for status");
                ReconcileOutcome::NotFound
            },
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            PipelineConfig,
            test_support::{RecordingPublisher, memory_store, outbound_record, pipeline_with},
        },
        std::sync::Arc,
        switchboard_messages::MessageStore,
        switchboard_webhook::MessageEvent,
    };

    fn status(id: &str, state: &str) -> StatusEvent {
        StatusEvent {
            message_id: id.into(),
            correlation_id: None,
            status: state.into(),
        }
    }

    async fn seeded() -> (Pipeline, Arc<RecordingPublisher>) {
        let store = memory_store().await;
        store
            .insert(&outbound_record("msg_1", "111"), ChangeOrigin::Admin)
            .await
            .unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        (pipeline_with(store, publisher.clone()), publisher)
    }

    #[tokio::test]
    async fn state_never_regresses() {
        let (pipeline, publisher) = seeded().await;

        let outcome = pipeline.reconcile(&status("msg_1", "read")).await.unwrap();
        let ReconcileOutcome::Updated(read) = outcome else {
            panic!("read must apply: {outcome:?}");
        };
        assert_eq!(read.delivery.state, DeliveryState::Read);
        assert_eq!(read.delivery.delivered_at, read.delivery.read_at);

        let outcome = pipeline.reconcile(&status("msg_1", "delivered")).await.unwrap();
        let ReconcileOutcome::Unchanged(after) = outcome else {
            panic!("late delivered must not apply: {outcome:?}");
        };
        assert_eq!(after.delivery, read.delivery);
        assert_eq!(publisher.changes().len(), 1);
    }

    #[tokio::test]
    async fn failed_status_is_unsupported() {
        let (pipeline, publisher) = seeded().await;
        let outcome = pipeline.reconcile(&status("msg_1", "failed")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::UnsupportedState("failed".into()));
        assert!(publisher.changes().is_empty());
    }

    #[tokio::test]
    async fn correlation_id_is_matched() {
        let store = memory_store().await;
        let mut record = outbound_record("msg_9", "111");
        record.correlation_id = Some("wamid.9".into());
        store.insert(&record, ChangeOrigin::Admin).await.unwrap();
        let pipeline = pipeline_with(store, Arc::new(RecordingPublisher::default()));

        let outcome = pipeline.reconcile(&status("wamid.9", "delivered")).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Updated(r) if r.message_id == "msg_9"));
    }

    #[tokio::test]
    async fn unknown_target_leaves_store_untouched() {
        let (pipeline, _) = seeded().await;
        let before = pipeline.stats().await.unwrap();
        let outcome = pipeline.reconcile(&status("ghost", "read")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NotFound);
        assert_eq!(pipeline.stats().await.unwrap(), before);
        assert_eq!(pipeline.pending_len().await, 1);
    }

    #[test]
    fn unmatched_status_is_counted_once() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let (pipeline, _) = seeded().await;
                let outcome = pipeline.reconcile(&status("ghost", "read")).await.unwrap();
                assert_eq!(outcome, ReconcileOutcome::NotFound);
                assert_eq!(pipeline.pending_len().await, 1);
            });
        });

        let rendered = handle.render();
        let count = |name: &str| {
            rendered
                .lines()
                .find(|line| line.starts_with(name))
                .and_then(|line| line.rsplit(' ').next())
                .map(str::to_string)
        };
        assert_eq!(count(pipeline_metrics::STATUSES_UNMATCHED_TOTAL).as_deref(), Some("1"));
        assert_eq!(count(pipeline_metrics::STATUSES_BUFFERED_TOTAL).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn buffered_status_replays_when_message_arrives() {
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = pipeline_with(memory_store().await, publisher.clone());

        let early = pipeline.reconcile(&status("m1", "read")).await.unwrap();
        assert_eq!(early, ReconcileOutcome::NotFound);

        let message = MessageEvent {
            message_id: "m1".into(),
            correlation_id: None,
            sender: "111".into(),
            recipient: "sys".into(),
            direction: switchboard_messages::Direction::Inbound,
            timestamp_secs: Some(1000),
            body: "hi".into(),
            attachment: None,
        };
        pipeline.ingest(message, None).await.unwrap();

        let record = pipeline.message("m1").await.unwrap().unwrap();
        assert_eq!(record.delivery.state, DeliveryState::Read);
        assert_eq!(pipeline.pending_len().await, 0);

        let changes = publisher.changes();
        assert!(matches!(changes[0], MessageChange::NewMessage { .. }));
        assert!(matches!(
            changes[1],
            MessageChange::StatusUpdated { status: DeliveryState::Read, .. }
        ));
    }

    #[tokio::test]
    async fn disabled_buffer_drops_unmatched() {
        let pipeline = Pipeline::new(
            memory_store().await,
            Arc::new(RecordingPublisher::default()),
            PipelineConfig {
                pending_enabled: false,
                ..PipelineConfig::default()
            },
        );
        pipeline.reconcile(&status("m1", "read")).await.unwrap();
        assert_eq!(pipeline.pending_len().await, 0);
    }

    #[tokio::test]
    async fn set_status_validates_state() {
        let (pipeline, _) = seeded().await;
        assert!(matches!(
            pipeline.set_status("msg_1", "bogus").await,
            Err(Error::InvalidState(s)) if s == "bogus"
        ));
        assert_eq!(
            pipeline.set_status("nope", "read").await.unwrap(),
            ReconcileOutcome::NotFound
        );
        assert_eq!(pipeline.pending_len().await, 0);

        let outcome = pipeline.set_status("msg_1", "Delivered").await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Updated(_)));
    }
}
