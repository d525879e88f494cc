//! Webhook payload normalization.
//!
//! Turns provider webhook bodies, bare or wrapped in a custom envelope field,
//! into an ordered list of canonical message and status events.

pub mod attachment;
pub mod event;
pub mod normalize;

pub use {
    attachment::extract_attachment,
    event::{CanonicalEvent, MessageEvent, StatusEvent},
    normalize::{DEFAULT_WRAPPER_FIELD, normalize},
};
