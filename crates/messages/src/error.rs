use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("corrupt message row {message_id}: {reason}")]
    Corrupt { message_id: String, reason: String },

    #[error("unknown delivery state: {0}")]
    UnknownState(String),

    #[error("unknown direction: {0}")]
    UnknownDirection(String),
}

impl Error {
    #[must_use]
    pub fn corrupt(message_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            message_id: message_id.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
