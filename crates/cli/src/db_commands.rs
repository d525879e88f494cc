use {
    clap::Subcommand,
    switchboard_common::time::now_ms,
    switchboard_config::SwitchboardConfig,
    switchboard_messages::{
        ChangeOrigin, Delivery, DeliveryState, Direction, InsertOutcome, MessageRecord,
        MessageStore, SqliteMessageStore,
    },
};

#[derive(Subcommand)]
pub enum DbAction {
    /// Run all pending database migrations.
    Migrate,
    /// Delete every stored message but keep the schema intact.
    Clear,
    /// Replace the stored messages with a small demo data set.
    Seed,
}

pub async fn handle_db(action: DbAction, config: &SwitchboardConfig) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    match action {
        DbAction::Migrate => {
            println!(
                "Migrations applied: {}",
                config.database.resolved_path().display()
            );
        },
        DbAction::Clear => {
            let removed = store.clear(ChangeOrigin::Admin).await?;
            println!("Deleted {removed} message(s).");
        },
        DbAction::Seed => seed(&store).await?,
    }
    store.pool().close().await;
    Ok(())
}

/// Open the configured database and bring its schema up to date.
pub async fn open_store(config: &SwitchboardConfig) -> anyhow::Result<SqliteMessageStore> {
    let path = config.database.resolved_path();
    let pool = switchboard_messages::open_pool(&path, config.database.max_connections).await?;
    switchboard_messages::run_migrations(&pool).await?;
    Ok(SqliteMessageStore::new(pool))
}

async fn seed(store: &dyn MessageStore) -> anyhow::Result<()> {
    let cleared = store.clear(ChangeOrigin::Admin).await?;
    if cleared > 0 {
        println!("Cleared {cleared} existing message(s).");
    }

    let records = demo_records(now_ms());
    let mut inserted = 0;
    for record in &records {
        if store.insert(record, ChangeOrigin::Admin).await? == InsertOutcome::Inserted {
            inserted += 1;
        }
    }

    let stats = store.stats().await?;
    println!("Added {inserted} demo message(s).");
    println!(
        "Store now has {} message(s) across {} conversation(s).",
        stats.messages, stats.conversations
    );
    Ok(())
}

const MINUTE_MS: i64 = 60_000;

/// Three conversations with a mix of inbound and outbound messages, timed
/// relative to `now`.
fn demo_records(now: i64) -> Vec<MessageRecord> {
    let inbound = |id: &str, from: &str, body: &str, minutes_ago: i64| {
        let at = now - minutes_ago * MINUTE_MS;
        MessageRecord {
            message_id: id.into(),
            correlation_id: None,
            conversation_id: from.into(),
            sender: from.into(),
            recipient: "system".into(),
            body: body.into(),
            attachment: None,
            created_at: at,
            direction: Direction::Inbound,
            delivery: Delivery::delivered(at),
            raw_payload: None,
        }
    };
    let outbound = |id: &str, to: &str, body: &str, minutes_ago: i64, state: DeliveryState| {
        let at = now - minutes_ago * MINUTE_MS;
        let delivered_at = (state >= DeliveryState::Delivered).then_some(at + 2 * MINUTE_MS);
        let read_at = (state >= DeliveryState::Read).then_some(at + 3 * MINUTE_MS);
        MessageRecord {
            message_id: id.into(),
            correlation_id: None,
            conversation_id: to.into(),
            sender: "system".into(),
            recipient: to.into(),
            body: body.into(),
            attachment: None,
            created_at: at,
            direction: Direction::Outbound,
            delivery: Delivery {
                state,
                sent_at: at,
                delivered_at,
                read_at,
            },
            raw_payload: None,
        }
    };

    vec![
        inbound(
            "msg_001",
            "1234567890",
            "Hello! This is a test message from conversation 1.",
            60,
        ),
        outbound(
            "msg_002",
            "1234567890",
            "Hi there! This is a reply from the system.",
            50,
            DeliveryState::Read,
        ),
        inbound(
            "msg_003",
            "1234567890",
            "Great! The message feed is working.",
            30,
        ),
        inbound(
            "msg_004",
            "9876543210",
            "Hey! This is conversation 2. How are you?",
            120,
        ),
        outbound(
            "msg_005",
            "9876543210",
            "Doing well, thanks for asking! How about you?",
            110,
            DeliveryState::Delivered,
        ),
        inbound(
            "msg_006",
            "9876543210",
            "All good here! Testing the real-time updates.",
            15,
        ),
        inbound("msg_007", "5555555555", "Welcome to switchboard!", 5),
    ]
}
