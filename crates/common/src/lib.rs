//! Error-context helpers and small utilities shared by the switchboard crates.

pub mod error;
pub mod time;

pub use error::FromMessage;
