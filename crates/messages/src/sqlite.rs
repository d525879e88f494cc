//! SQLite-backed message store using sqlx.

use {
    async_trait::async_trait,
    sqlx::{FromRow, SqlitePool},
    switchboard_common::time::now_ms,
    tokio::sync::broadcast,
    tracing::debug,
};

use crate::{
    Error, Result,
    model::{
        Attachment, ConversationSummary, Delivery, DeliveryState, Direction, MessageRecord, Page,
        StoreStats,
    },
    store::{ChangeOrigin, InsertOutcome, MessageStore, StatusApply, StatusTarget, StoreChange},
};

/// Buffered change-feed entries per subscriber before it starts lagging.
const CHANGE_FEED_CAPACITY: usize = 256;

/// Every column except `raw_payload` and `inserted_at`.
const COLUMNS: &str = "message_id, correlation_id, conversation_id, sender, recipient, body, \
                       attachment, created_at, direction, delivery_state, sent_at, delivered_at, \
                       read_at";

/// SQLite-backed message store.
pub struct SqliteMessageStore {
    pool: SqlitePool,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteMessageStore {
    /// Wrap a pool whose schema is already migrated (see [`crate::run_migrations`]).
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn announce(&self, change: StoreChange) {
        // No receivers is fine; the feed is best effort.
        let _ = self.changes.send(change);
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    message_id: String,
    correlation_id: Option<String>,
    conversation_id: String,
    sender: String,
    recipient: String,
    body: String,
    attachment: Option<String>,
    created_at: i64,
    direction: String,
    delivery_state: i64,
    sent_at: i64,
    delivered_at: Option<i64>,
    read_at: Option<i64>,
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        let state = DeliveryState::from_rank(row.delivery_state).ok_or_else(|| {
            Error::corrupt(&row.message_id, format!("delivery_state {}", row.delivery_state))
        })?;
        let direction: Direction = row
            .direction
            .parse()
            .map_err(|e: Error| Error::corrupt(&row.message_id, e.to_string()))?;
        let attachment = row
            .attachment
            .as_deref()
            .map(serde_json::from_str::<Attachment>)
            .transpose()?;

        Ok(Self {
            message_id: row.message_id,
            correlation_id: row.correlation_id,
            conversation_id: row.conversation_id,
            sender: row.sender,
            recipient: row.recipient,
            body: row.body,
            attachment,
            created_at: row.created_at,
            direction,
            delivery: Delivery {
                state,
                sent_at: row.sent_at,
                delivered_at: row.delivered_at,
                read_at: row.read_at,
            },
            raw_payload: None,
        })
    }
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    message: MessageRow,
    unread_count: i64,
    total_messages: i64,
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(&self, record: &MessageRecord, origin: ChangeOrigin) -> Result<InsertOutcome> {
        let attachment = record
            .attachment
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let raw = record
            .raw_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "INSERT INTO messages
             (message_id, correlation_id, conversation_id, sender, recipient, body,
              attachment, created_at, direction, delivery_state, sent_at, delivered_at,
              read_at, raw_payload, inserted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(message_id) DO NOTHING",
        )
        .bind(&record.message_id)
        .bind(&record.correlation_id)
        .bind(&record.conversation_id)
        .bind(&record.sender)
        .bind(&record.recipient)
        .bind(&record.body)
        .bind(attachment)
        .bind(record.created_at)
        .bind(record.direction.as_str())
        .bind(record.delivery.state.rank())
        .bind(record.delivery.sent_at)
        .bind(record.delivery.delivered_at)
        .bind(record.delivery.read_at)
        .bind(raw)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(message_id = %record.message_id, "duplicate message ignored");
            return Ok(InsertOutcome::Duplicate);
        }

        let mut stored = record.clone();
        stored.raw_payload = None;
        self.announce(StoreChange::Inserted {
            origin,
            record: stored,
        });
        Ok(InsertOutcome::Inserted)
    }

    async fn find(&self, id: &str) -> Result<Option<MessageRecord>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {COLUMNS} FROM messages
             WHERE message_id = ?1 OR correlation_id = ?1
             ORDER BY message_id = ?1 DESC
             LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MessageRecord::try_from).transpose()
    }

    async fn raw_payload(&self, message_id: &str) -> Result<Option<serde_json::Value>> {
        let raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT raw_payload FROM messages WHERE message_id = ?")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(raw
            .flatten()
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?)
    }

    async fn apply_status(
        &self,
        target: &StatusTarget,
        state: DeliveryState,
        at: i64,
        origin: ChangeOrigin,
    ) -> Result<StatusApply> {
        let alt = target.alt_id.as_deref().unwrap_or(&target.id);

        // Single statement: pick the target row, raise the state, backfill
        // missing timestamps, and skip the write entirely when nothing moves.
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "UPDATE messages SET
                 delivery_state = MAX(delivery_state, ?3),
                 delivered_at   = CASE WHEN ?3 >= 1 THEN COALESCE(delivered_at, ?4)
                                       ELSE delivered_at END,
                 read_at        = CASE WHEN ?3 >= 2 THEN COALESCE(read_at, ?4)
                                       ELSE read_at END
             WHERE rowid = (
                 SELECT rowid FROM messages
                 WHERE message_id IN (?1, ?2) OR correlation_id IN (?1, ?2)
                 ORDER BY message_id IN (?1, ?2) DESC
                 LIMIT 1
             )
             AND (delivery_state < ?3
                  OR (?3 >= 1 AND delivered_at IS NULL)
                  OR (?3 >= 2 AND read_at IS NULL))
             RETURNING {COLUMNS}"
        ))
        .bind(&target.id)
        .bind(alt)
        .bind(state.rank())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let record = MessageRecord::try_from(row)?;
            self.announce(StoreChange::Updated {
                origin,
                record: record.clone(),
            });
            return Ok(StatusApply::Applied(record));
        }

        let existing = match self.find(&target.id).await? {
            Some(record) => Some(record),
            None if alt != target.id => self.find(alt).await?,
            None => None,
        };
        Ok(existing.map_or(StatusApply::NotFound, StatusApply::Unchanged))
    }

    async fn list_conversation(
        &self,
        conversation_id: &str,
        page: Page,
    ) -> Result<Vec<MessageRecord>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {COLUMNS} FROM messages
             WHERE conversation_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(conversation_id)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.skip))
        .fetch_all(&self.pool)
        .await?;

        let mut records = rows
            .into_iter()
            .map(MessageRecord::try_from)
            .collect::<Result<Vec<_>>>()?;
        records.reverse();
        Ok(records)
    }

    async fn conversation_summaries(&self) -> Result<Vec<ConversationSummary>> {
        let columns = COLUMNS
            .split(", ")
            .map(|c| format!("m.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = sqlx::query_as::<_, SummaryRow>(&format!(
            "SELECT {columns}, agg.unread_count, agg.total_messages
             FROM (
                 SELECT conversation_id,
                        SUM(CASE WHEN direction = 'inbound' AND delivery_state < 2
                                 THEN 1 ELSE 0 END) AS unread_count,
                        COUNT(*) AS total_messages
                 FROM messages
                 GROUP BY conversation_id
             ) AS agg
             JOIN messages AS m ON m.rowid = (
                 SELECT rowid FROM messages
                 WHERE conversation_id = agg.conversation_id
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1
             )
             ORDER BY m.created_at DESC, m.rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let last_message = MessageRecord::try_from(row.message)?;
                Ok(ConversationSummary {
                    conversation_id: last_message.conversation_id.clone(),
                    last_message,
                    unread_count: row.unread_count,
                    total_messages: row.total_messages,
                })
            })
            .collect()
    }

    async fn stats(&self) -> Result<StoreStats> {
        let (messages, conversations): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(DISTINCT conversation_id) FROM messages")
                .fetch_one(&self.pool)
                .await?;
        Ok(StoreStats {
            messages,
            conversations,
        })
    }

    async fn delete(&self, message_id: &str, origin: ChangeOrigin) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE message_id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            self.announce(StoreChange::Deleted {
                origin,
                message_id: message_id.to_string(),
            });
        }
        Ok(deleted)
    }

    async fn clear(&self, origin: ChangeOrigin) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages")
            .execute(&self.pool)
            .await?;
        self.announce(StoreChange::Cleared { origin });
        Ok(result.rows_affected())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
