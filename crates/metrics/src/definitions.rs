//! Metric name and label definitions.
//!
//! Every metric switchboard emits is named here so dashboards have one place
//! to look.

/// Webhook intake metrics
pub mod webhook {
    /// Payloads accepted on `POST /webhook` (and by batch processing)
    pub const PAYLOADS_TOTAL: &str = "switchboard_webhook_payloads_total";
    /// Payloads rejected before normalization (unparseable body, store down)
    pub const PAYLOADS_REJECTED_TOTAL: &str = "switchboard_webhook_payloads_rejected_total";
    /// Canonical events produced by the normalizer, labelled by `kind`
    pub const EVENTS_TOTAL: &str = "switchboard_webhook_events_total";
    /// End-to-end processing time of one payload in seconds
    pub const PROCESSING_DURATION_SECONDS: &str =
        "switchboard_webhook_processing_duration_seconds";
}

/// Ingestion and reconciliation outcomes
pub mod pipeline {
    /// Messages inserted, labelled by `direction`
    pub const MESSAGES_STORED_TOTAL: &str = "switchboard_messages_stored_total";
    /// Redelivered messages skipped by the uniqueness constraint
    pub const MESSAGES_DUPLICATE_TOTAL: &str = "switchboard_messages_duplicate_total";
    /// Status events applied, labelled by `state`
    pub const STATUSES_APPLIED_TOTAL: &str = "switchboard_statuses_applied_total";
    /// Status events that changed nothing (late or repeated)
    pub const STATUSES_UNCHANGED_TOTAL: &str = "switchboard_statuses_unchanged_total";
    /// Status events whose target message is unknown
    pub const STATUSES_UNMATCHED_TOTAL: &str = "switchboard_statuses_unmatched_total";
    /// Status events buffered for a later replay
    pub const STATUSES_BUFFERED_TOTAL: &str = "switchboard_statuses_buffered_total";
    /// Buffered status events replayed after their message arrived
    pub const STATUSES_REPLAYED_TOTAL: &str = "switchboard_statuses_replayed_total";
    /// Per-event failures (store errors, timeouts), labelled by `stage`
    pub const EVENT_FAILURES_TOTAL: &str = "switchboard_event_failures_total";
}

/// Real-time fan-out metrics
pub mod realtime {
    /// Currently connected WebSocket clients
    pub const CONNECTIONS_ACTIVE: &str = "switchboard_ws_connections_active";
    /// Frames delivered to subscribers
    pub const FRAMES_SENT_TOTAL: &str = "switchboard_ws_frames_sent_total";
    /// Subscribers dropped because their connection closed
    pub const SUBSCRIBERS_PRUNED_TOTAL: &str = "switchboard_ws_subscribers_pruned_total";
}

/// Histogram bucket boundaries.
pub mod buckets {
    /// Payload processing duration buckets (in seconds), 1ms to 10s
    pub const PROCESSING_DURATION: &[f64] = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];
}
