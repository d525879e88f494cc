#![allow(clippy::unwrap_used, clippy::expect_used)]
//! WebSocket fan-out tests.

mod common;

use std::{net::SocketAddr, time::Duration};

use {
    common::{post_webhook, start_test_server, status_update, text_message},
    futures::{SinkExt, StreamExt},
    serde_json::{Value, json},
    switchboard_messages::{ChangeOrigin, Delivery, Direction, MessageRecord, MessageStore},
    tokio::net::TcpStream,
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: SocketAddr) -> Client {
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let hello = next_frame(&mut ws).await;
    assert_eq!(hello["event"], "hello");
    assert_eq!(hello["payload"]["protocol"], 1);
    ws
}

async fn next_frame(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn join(ws: &mut Client, conversation_id: &str) {
    send(
        ws,
        json!({ "type": "join:conversation", "conversation_id": conversation_id }),
    )
    .await;
    let joined = next_frame(ws).await;
    assert_eq!(joined["event"], "conversation:joined");
    assert_eq!(joined["payload"]["conversation_id"], conversation_id);
}

#[tokio::test]
async fn joined_client_receives_new_message_and_update() {
    let server = start_test_server().await;
    let mut ws = connect(server.addr).await;
    join(&mut ws, "15551234567").await;

    post_webhook(
        server.addr,
        &text_message("wamid.A1", "15551234567", "hello", 1_700_000_000),
    )
    .await;
    let created = next_frame(&mut ws).await;
    assert_eq!(created["event"], "message:new");
    assert_eq!(created["payload"]["conversationId"], "15551234567");
    assert_eq!(created["payload"]["message"]["messageId"], "wamid.A1");

    post_webhook(server.addr, &status_update("wamid.A1", "read", "15551234567")).await;
    let updated = next_frame(&mut ws).await;
    assert_eq!(updated["event"], "message:update");
    assert_eq!(updated["payload"]["messageId"], "wamid.A1");
    assert_eq!(updated["payload"]["status"], "read");
    assert!(updated["seq"].as_u64() > created["seq"].as_u64());
}

#[tokio::test]
async fn other_conversations_are_not_delivered() {
    let server = start_test_server().await;
    let mut ws = connect(server.addr).await;
    join(&mut ws, "111").await;

    post_webhook(server.addr, &text_message("wamid.B", "222", "not yours", 1_700_000_000)).await;
    post_webhook(server.addr, &text_message("wamid.A", "111", "yours", 1_700_000_001)).await;

    let frame = next_frame(&mut ws).await;
    assert_eq!(frame["payload"]["message"]["messageId"], "wamid.A");
}

#[tokio::test]
async fn inbox_subscription_sees_every_conversation() {
    let server = start_test_server().await;
    let mut ws = connect(server.addr).await;
    join(&mut ws, "*").await;

    post_webhook(server.addr, &text_message("wamid.1", "111", "a", 1_700_000_000)).await;
    post_webhook(server.addr, &text_message("wamid.2", "222", "b", 1_700_000_001)).await;

    assert_eq!(next_frame(&mut ws).await["payload"]["conversationId"], "111");
    assert_eq!(next_frame(&mut ws).await["payload"]["conversationId"], "222");
}

#[tokio::test]
async fn duplicate_delivery_is_not_rebroadcast() {
    let server = start_test_server().await;
    let mut ws = connect(server.addr).await;
    join(&mut ws, "111").await;

    let payload = text_message("wamid.A", "111", "once", 1_700_000_000);
    post_webhook(server.addr, &payload).await;
    post_webhook(server.addr, &payload).await;
    send(&mut ws, json!({ "type": "ping" })).await;

    assert_eq!(next_frame(&mut ws).await["event"], "message:new");
    assert_eq!(next_frame(&mut ws).await["event"], "pong");
}

#[tokio::test]
async fn admin_writes_are_mirrored() {
    let server = start_test_server().await;
    let mut ws = connect(server.addr).await;
    join(&mut ws, "333").await;

    let record = MessageRecord {
        message_id: "seed-1".into(),
        correlation_id: None,
        conversation_id: "333".into(),
        sender: "333".into(),
        recipient: "15550001111".into(),
        body: "seeded".into(),
        attachment: None,
        created_at: 1_700_000_000_000,
        direction: Direction::Inbound,
        delivery: Delivery::delivered(1_700_000_000_000),
        raw_payload: None,
    };
    server.store.insert(&record, ChangeOrigin::Admin).await.unwrap();

    let frame = next_frame(&mut ws).await;
    assert_eq!(frame["event"], "message:new");
    assert_eq!(frame["payload"]["message"]["body"], "seeded");
}

#[tokio::test]
async fn leaving_stops_delivery() {
    let server = start_test_server().await;
    let mut ws = connect(server.addr).await;
    join(&mut ws, "111").await;
    send(
        &mut ws,
        json!({ "type": "leave:conversation", "conversation_id": "111" }),
    )
    .await;
    assert_eq!(next_frame(&mut ws).await["event"], "conversation:left");

    post_webhook(server.addr, &text_message("wamid.A", "111", "gone", 1_700_000_000)).await;
    send(&mut ws, json!({ "type": "ping" })).await;
    assert_eq!(next_frame(&mut ws).await["event"], "pong");
}

#[tokio::test]
async fn malformed_frames_get_error_events() {
    let server = start_test_server().await;
    let mut ws = connect(server.addr).await;

    send(&mut ws, json!({ "type": "typing" })).await;
    let error = next_frame(&mut ws).await;
    assert_eq!(error["event"], "error");
    assert_eq!(error["payload"]["code"], "INVALID_FRAME");

    ws.send(Message::Text("x".repeat(20_000).into())).await.unwrap();
    let error = next_frame(&mut ws).await;
    assert_eq!(error["payload"]["code"], "FRAME_TOO_LARGE");
}

#[tokio::test]
async fn disconnect_releases_subscriptions() {
    let server = start_test_server().await;
    let mut ws = connect(server.addr).await;
    join(&mut ws, "111").await;
    assert_eq!(server.state.hub.subscriber_count("111").await, 1);

    ws.close(None).await.unwrap();
    for _ in 0..50 {
        if server.state.client_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.state.client_count().await, 0);
    assert_eq!(server.state.hub.subscriber_count("111").await, 0);
}
