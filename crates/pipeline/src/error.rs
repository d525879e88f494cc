use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] switchboard_messages::Error),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid delivery state: {0}")]
    InvalidState(String),

    #[error("message needs text or an attachment")]
    EmptyMessage,
}

pub type Result<T> = std::result::Result<T, Error>;
