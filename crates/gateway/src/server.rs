use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::{ConnectInfo, DefaultBodyLimit, State, WebSocketUpgrade},
        http::HeaderValue,
        response::IntoResponse,
        routing::{get, post, put},
    },
    switchboard_config::{ServerConfig, SwitchboardConfig},
    switchboard_messages::{MessageStore, SqliteMessageStore},
    switchboard_metrics::MetricsHandle,
    switchboard_pipeline::{Pipeline, PipelineConfig},
    tower_http::{
        cors::{AllowOrigin, Any, CorsLayer},
        limit::RequestBodyLimitLayer,
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use crate::{hub::ConversationHub, mirror::spawn_change_mirror, routes, state::GatewayState, ws};

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>, server: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/", get(routes::index_handler))
        .route("/health", get(routes::health_handler))
        .route("/ws", get(ws_upgrade_handler))
        .route("/webhook", post(routes::webhook_handler))
        .route("/api/conversations", get(routes::list_conversations))
        .route(
            "/api/conversations/{conversation_id}/messages",
            get(routes::list_messages).post(routes::send_message),
        )
        .route("/api/messages/{id}", get(routes::get_message))
        .route("/api/messages/{id}/status", put(routes::update_status));

    #[cfg(feature = "prometheus")]
    let router = router.route("/metrics", get(routes::prometheus_metrics_handler));

    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.body_limit_bytes))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return cors.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            },
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Wire the store, pipeline and hub together from config.
///
/// Opens and migrates the database, and starts the change-feed mirror.
pub async fn prepare_gateway(
    config: &SwitchboardConfig,
    metrics_handle: Option<MetricsHandle>,
) -> anyhow::Result<Arc<GatewayState>> {
    let db_path = config.database.resolved_path();
    let pool = switchboard_messages::open_pool(&db_path, config.database.max_connections).await?;
    switchboard_messages::run_migrations(&pool).await?;
    info!(path = %db_path.display(), "message store ready");

    let store = Arc::new(SqliteMessageStore::new(pool));
    let hub = Arc::new(ConversationHub::new());
    spawn_change_mirror(store.subscribe_changes(), Arc::clone(&hub));

    let pipeline = Arc::new(Pipeline::new(
        store,
        Arc::clone(&hub) as _,
        PipelineConfig::from(config),
    ));
    Ok(GatewayState::new(
        pipeline,
        hub,
        &config.messages,
        metrics_handle,
    ))
}

/// Start the gateway HTTP + WebSocket server and run until shutdown.
pub async fn start_gateway(
    config: &SwitchboardConfig,
    metrics_handle: Option<MetricsHandle>,
) -> anyhow::Result<()> {
    let state = prepare_gateway(config, metrics_handle).await?;
    let app = build_gateway_app(state, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "switchboard gateway listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            },
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws::handle_connection(socket, state, addr))
}
