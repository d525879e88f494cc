//! Message persistence: the SQLite store, its change feed, and the stored
//! message model.

pub mod error;
pub mod model;
pub mod sqlite;
pub mod store;

use std::{path::Path, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

pub use {
    error::{Error, Result},
    model::{
        Attachment, AttachmentKind, ConversationSummary, Delivery, DeliveryState, Direction,
        MessageRecord, Page, StoreStats,
    },
    sqlite::SqliteMessageStore,
    store::{ChangeOrigin, InsertOutcome, MessageStore, StatusApply, StatusTarget, StoreChange},
};

/// Open (creating if needed) the database file and return a pool.
///
/// Migrations are not run; call [`run_migrations`] afterwards.
pub async fn open_pool(path: &Path, max_connections: u32) -> Result<SqlitePool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Run database migrations for the message store.
///
/// Creates the `messages` table and its indexes. Call at startup before
/// constructing a [`SqliteMessageStore`].
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
