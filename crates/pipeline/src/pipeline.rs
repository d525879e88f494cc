use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    serde::Serialize,
    serde_json::Value,
    switchboard_config::SwitchboardConfig,
    switchboard_messages::{ConversationSummary, MessageRecord, MessageStore, Page, StoreStats},
    switchboard_metrics::{counter, histogram, pipeline as pipeline_metrics, webhook},
    switchboard_webhook::{CanonicalEvent, normalize},
    tokio::sync::Mutex,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    ingest::IngestOutcome,
    notify::ChangePublisher,
    pending::PendingStatuses,
    reconcile::ReconcileOutcome,
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Envelope field unwrapped by the normalizer.
    pub wrapper_field: String,
    /// Sender recorded on outbound messages.
    pub outbound_sender: String,
    /// Upper bound for each store round trip.
    pub operation_timeout: Duration,
    pub pending_enabled: bool,
    pub pending_ttl: Duration,
    pub pending_max_entries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&SwitchboardConfig::default())
    }
}

impl From<&SwitchboardConfig> for PipelineConfig {
    fn from(config: &SwitchboardConfig) -> Self {
        Self {
            wrapper_field: config.webhook.wrapper_field.clone(),
            outbound_sender: config.messages.outbound_sender.clone(),
            operation_timeout: Duration::from_millis(config.database.operation_timeout_ms),
            pending_enabled: config.pending.enabled,
            pending_ttl: Duration::from_secs(config.pending.ttl_secs),
            pending_max_entries: config.pending.max_entries,
        }
    }
}

/// Result of one canonical event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Ingested(IngestOutcome),
    Reconciled(ReconcileOutcome),
}

/// Per-payload tally. Per-event failures are counted, never propagated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PayloadReport {
    pub events: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub statuses_applied: usize,
    pub statuses_unchanged: usize,
    pub statuses_unmatched: usize,
    pub statuses_unsupported: usize,
    pub failed: usize,
}

impl PayloadReport {
    fn record(&mut self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::Ingested(IngestOutcome::Stored(_)) => self.stored += 1,
            EventOutcome::Ingested(IngestOutcome::Duplicate) => self.duplicates += 1,
            EventOutcome::Reconciled(ReconcileOutcome::Updated(_)) => self.statuses_applied += 1,
            EventOutcome::Reconciled(ReconcileOutcome::Unchanged(_)) => {
                self.statuses_unchanged += 1
            },
            EventOutcome::Reconciled(ReconcileOutcome::NotFound) => self.statuses_unmatched += 1,
            EventOutcome::Reconciled(ReconcileOutcome::UnsupportedState(_)) => {
                self.statuses_unsupported += 1
            },
        }
    }
}

/// Applies canonical events to the store and announces the changes.
pub struct Pipeline {
    pub(crate) store: Arc<dyn MessageStore>,
    pub(crate) publisher: Arc<dyn ChangePublisher>,
    pub(crate) pending: Option<Mutex<PendingStatuses>>,
    pub(crate) config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        publisher: Arc<dyn ChangePublisher>,
        config: PipelineConfig,
    ) -> Self {
        let pending = config
            .pending_enabled
            .then(|| Mutex::new(PendingStatuses::new(config.pending_ttl, config.pending_max_entries)));
        Self {
            store,
            publisher,
            pending,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Normalize a webhook body and apply its events in order.
    pub async fn process_payload(&self, payload: &Value) -> PayloadReport {
        let started = Instant::now();
        let events = normalize(payload, &self.config.wrapper_field);
        counter!(webhook::PAYLOADS_TOTAL).increment(1);

        let mut report = PayloadReport {
            events: events.len(),
            ..Default::default()
        };
        for event in events {
            let kind = match event {
                CanonicalEvent::Message(_) => "message",
                CanonicalEvent::Status(_) => "status",
            };
            counter!(webhook::EVENTS_TOTAL, "kind" => kind).increment(1);
            let message_id = event.message_id().to_string();

            match self.handle_event(event, Some(payload)).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    report.failed += 1;
                    counter!(pipeline_metrics::EVENT_FAILURES_TOTAL, "stage" => kind).increment(1);
                    warn!(%message_id, kind, error = %e, "webhook event failed");
                },
            }
        }

        histogram!(webhook::PROCESSING_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(?report, "payload processed");
        report
    }

    /// Apply one event. Message events keep `raw_payload` as their audit copy.
    pub async fn handle_event(
        &self,
        event: CanonicalEvent,
        raw_payload: Option<&Value>,
    ) -> Result<EventOutcome> {
        match event {
            CanonicalEvent::Message(message) => self
                .ingest(message, raw_payload)
                .await
                .map(EventOutcome::Ingested),
            CanonicalEvent::Status(status) => {
                self.reconcile(&status).await.map(EventOutcome::Reconciled)
            },
        }
    }

    pub async fn ping(&self) -> Result<()> {
        self.bounded(self.store.ping()).await
    }

    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.bounded(self.store.conversation_summaries()).await
    }

    pub async fn messages(&self, conversation_id: &str, page: Page) -> Result<Vec<MessageRecord>> {
        self.bounded(self.store.list_conversation(conversation_id, page))
            .await
    }

    pub async fn message(&self, id: &str) -> Result<Option<MessageRecord>> {
        self.bounded(self.store.find(id)).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.bounded(self.store.stats()).await
    }

    /// Number of status events waiting for their message.
    pub async fn pending_len(&self) -> usize {
        match &self.pending {
            Some(pending) => pending.lock().await.len(),
            None => 0,
        }
    }

    /// Run a store operation under the configured timeout.
    pub(crate) async fn bounded<T>(
        &self,
        op: impl Future<Output = switchboard_messages::Result<T>>,
    ) -> Result<T> {
        let limit = self.config.operation_timeout;
        match tokio::time::timeout(limit, op).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Timeout(limit)),
        }
    }
}
