#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::{net::SocketAddr, sync::Arc};

use {
    serde_json::{Value, json},
    sqlx::sqlite::SqlitePoolOptions,
    switchboard_config::{MessagesConfig, ServerConfig},
    switchboard_gateway::{
        ConversationHub, GatewayState, build_gateway_app, mirror::spawn_change_mirror,
    },
    switchboard_messages::{MessageStore, SqliteMessageStore},
    switchboard_pipeline::{Pipeline, PipelineConfig},
    tokio::net::TcpListener,
};

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<GatewayState>,
    pub store: Arc<SqliteMessageStore>,
}

/// Spin up a gateway over an in-memory store on an ephemeral port.
pub async fn start_test_server() -> TestServer {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    switchboard_messages::run_migrations(&pool).await.unwrap();

    let store = Arc::new(SqliteMessageStore::new(pool));
    let hub = Arc::new(ConversationHub::new());
    spawn_change_mirror(store.subscribe_changes(), Arc::clone(&hub));
    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store) as _,
        Arc::clone(&hub) as _,
        PipelineConfig::default(),
    ));
    let state = GatewayState::new(pipeline, hub, &MessagesConfig::default(), None);
    let app = build_gateway_app(Arc::clone(&state), &ServerConfig::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    TestServer { addr, state, store }
}

/// A wrapped webhook body carrying one inbound text message.
pub fn text_message(id: &str, from: &str, body: &str, timestamp: i64) -> Value {
    json!({
        "metaData": {
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "waba-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": { "phone_number_id": "15550001111" },
                        "contacts": [{ "wa_id": from, "profile": { "name": "Ada" } }],
                        "messages": [{
                            "id": id,
                            "from": from,
                            "timestamp": timestamp.to_string(),
                            "type": "text",
                            "text": { "body": body },
                        }],
                    },
                }],
            }],
        }
    })
}

/// A webhook body carrying one status event.
pub fn status_update(id: &str, status: &str, recipient: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "changes": [{
                "field": "messages",
                "value": {
                    "metadata": { "phone_number_id": "15550001111" },
                    "statuses": [{
                        "id": id,
                        "status": status,
                        "recipient_id": recipient,
                        "timestamp": "1700000100",
                    }],
                },
            }],
        }],
    })
}

pub async fn post_webhook(addr: SocketAddr, body: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/webhook"))
        .json(body)
        .send()
        .await
        .unwrap()
}
