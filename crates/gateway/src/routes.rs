//! HTTP handlers: webhook intake and the message API.

use std::sync::Arc;

use {
    axum::{
        Json,
        body::Bytes,
        extract::{
            Path, Query, State,
            rejection::{JsonRejection, QueryRejection},
        },
        http::StatusCode,
        response::IntoResponse,
    },
    serde::Deserialize,
    serde_json::json,
    switchboard_messages::{Attachment, ConversationSummary, MessageRecord},
    switchboard_metrics::{counter, webhook},
    switchboard_pipeline::ReconcileOutcome,
    tracing::{debug, warn},
};

use crate::{
    error::{ApiError, ApiResult},
    state::GatewayState,
};

pub async fn index_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(json!({
        "name": "switchboard",
        "version": state.version,
        "endpoints": {
            "webhook": "POST /webhook",
            "conversations": "GET /api/conversations",
            "messages": "GET|POST /api/conversations/{conversation_id}/messages",
            "message": "GET /api/messages/{id}",
            "status": "PUT /api/messages/{id}/status",
            "realtime": "GET /ws",
            "health": "GET /health",
        },
    }))
}

pub async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": state.version,
        "uptime_secs": state.uptime_secs(),
        "connections": state.client_count().await,
        "subscribers": state.hub.total_subscriptions().await,
    }))
}

/// Accept a webhook body. Per-event outcomes never change the response; only
/// an unparseable body or an unreachable store does.
pub async fn webhook_handler(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> impl IntoResponse {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            counter!(webhook::PAYLOADS_REJECTED_TOTAL, "reason" => "invalid_json").increment(1);
            debug!(error = %e, "webhook: body is not JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "request body must be JSON" })),
            );
        },
    };

    if let Err(e) = state.pipeline.ping().await {
        counter!(webhook::PAYLOADS_REJECTED_TOTAL, "reason" => "store_unavailable").increment(1);
        warn!(error = %e, "webhook: store unreachable");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "message store unavailable" })),
        );
    }

    let report = state.pipeline.process_payload(&payload).await;
    (StatusCode::OK, Json(json!({ "status": "success", "report": report })))
}

pub async fn list_conversations(
    State(state): State<Arc<GatewayState>>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.pipeline.conversations().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<MessageRecord>>> {
    let Query(query) = query?;
    let page = state.page(query.limit, query.skip);
    Ok(Json(state.pipeline.messages(&conversation_id, page).await?))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<String>,
    body: Result<Json<SendMessageBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageRecord>)> {
    let Json(body) = body?;
    let record = state
        .pipeline
        .send_outbound(&conversation_id, body.text, body.attachment)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_message(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageRecord>> {
    state
        .pipeline
        .message(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("message {id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub state: String,
}

pub async fn update_status(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<Json<MessageRecord>> {
    let Json(body) = body?;
    match state.pipeline.set_status(&id, &body.state).await? {
        ReconcileOutcome::Updated(record) | ReconcileOutcome::Unchanged(record) => Ok(Json(record)),
        ReconcileOutcome::NotFound => Err(ApiError::NotFound(format!("message {id} not found"))),
        ReconcileOutcome::UnsupportedState(state) => {
            Err(ApiError::BadRequest(format!("invalid state: {state}")))
        },
    }
}

#[cfg(feature = "prometheus")]
pub async fn prometheus_metrics_handler(
    State(state): State<Arc<GatewayState>>,
) -> axum::response::Response {
    use axum::http::header;

    match state.metrics_handle.as_ref() {
        Some(handle) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not enabled".to_string(),
        )
            .into_response(),
    }
}
