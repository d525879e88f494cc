//! Gateway: HTTP + WebSocket surface over the ingestion pipeline.
//!
//! Lifecycle:
//! 1. Open and migrate the message store
//! 2. Build the pipeline with the conversation hub as its publisher
//! 3. Mirror out-of-band store writes into the hub
//! 4. Serve the webhook, the message API and `/ws` until shutdown

pub mod error;
pub mod hub;
pub mod mirror;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use {
    error::{ApiError, ApiResult},
    hub::ConversationHub,
    server::{build_gateway_app, prepare_gateway, start_gateway},
    state::GatewayState,
};
