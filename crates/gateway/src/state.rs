use std::{collections::HashMap, sync::Arc, time::Instant};

use {
    switchboard_config::MessagesConfig,
    switchboard_messages::Page,
    switchboard_metrics::{MetricsHandle, gauge, realtime},
    switchboard_pipeline::Pipeline,
    tokio::sync::RwLock,
};

use crate::hub::ConversationHub;

/// A WebSocket client currently connected to the gateway.
#[derive(Debug)]
pub struct ConnectedClient {
    pub conn_id: String,
    pub connected_at: Instant,
}

/// Shared gateway state.
pub struct GatewayState {
    pub pipeline: Arc<Pipeline>,
    pub hub: Arc<ConversationHub>,
    pub version: String,
    pub started_at: Instant,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub metrics_handle: Option<MetricsHandle>,
    clients: RwLock<HashMap<String, ConnectedClient>>,
}

impl GatewayState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        hub: Arc<ConversationHub>,
        messages: &MessagesConfig,
        metrics_handle: Option<MetricsHandle>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            hub,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
            default_page_size: messages.default_page_size.max(1),
            max_page_size: messages.max_page_size.max(1),
            metrics_handle,
            clients: RwLock::new(HashMap::new()),
        })
    }

    /// Resolve query parameters into a page, clamped to `1..=max_page_size`.
    pub fn page(&self, limit: Option<u32>, skip: Option<u32>) -> Page {
        let limit = limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        Page {
            limit,
            skip: skip.unwrap_or(0),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub async fn register_client(&self, client: ConnectedClient) {
        let mut clients = self.clients.write().await;
        clients.insert(client.conn_id.clone(), client);
        gauge!(realtime::CONNECTIONS_ACTIVE).set(clients.len() as f64);
    }

    /// Remove a client and all of its subscriptions.
    pub async fn remove_client(&self, conn_id: &str) -> Option<ConnectedClient> {
        self.hub.leave_all(conn_id).await;
        let mut clients = self.clients.write().await;
        let removed = clients.remove(conn_id);
        gauge!(realtime::CONNECTIONS_ACTIVE).set(clients.len() as f64);
        removed
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}
