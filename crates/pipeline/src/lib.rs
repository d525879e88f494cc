//! Ingestion and status reconciliation.
//!
//! [`Pipeline`] applies canonical webhook events to a [`MessageStore`]
//! and announces what changed through a [`ChangePublisher`].
//!
//! [`MessageStore`]: switchboard_messages::MessageStore

pub mod error;
mod ingest;
pub mod notify;
pub mod pending;
mod pipeline;
mod reconcile;

pub use {
    error::{Error, Result},
    ingest::IngestOutcome,
    notify::{ChangePublisher, MessageChange, NoopPublisher},
    pending::PendingStatuses,
    pipeline::{EventOutcome, PayloadReport, Pipeline, PipelineConfig},
    reconcile::ReconcileOutcome,
};

#[cfg(test)]
mod test_support;
