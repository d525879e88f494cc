//! Metrics collection and export for switchboard.
//!
//! Call sites record through the `metrics` crate facade; without an installed
//! recorder every macro is a no-op. With the `prometheus` feature the gateway
//! installs a Prometheus recorder and renders it on `/metrics`.
//!
//! ```rust,ignore
//! use switchboard_metrics::{counter, pipeline};
//!
//! counter!(pipeline::MESSAGES_STORED_TOTAL, "direction" => "inbound").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
