use {
    axum::{
        Json,
        extract::rejection::{JsonRejection, QueryRejection},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    tracing::{error, warn},
};

/// Error returned by HTTP handlers, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<switchboard_pipeline::Error> for ApiError {
    fn from(err: switchboard_pipeline::Error) -> Self {
        use switchboard_pipeline::Error;
        match err {
            Error::InvalidState(state) => Self::BadRequest(format!("invalid state: {state}")),
            Error::EmptyMessage => Self::BadRequest(Error::EmptyMessage.to_string()),
            Error::Timeout(limit) => Self::Unavailable(Error::Timeout(limit).to_string()),
            Error::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(msg) => {
                warn!(error = %msg, "request failed: store unavailable");
                StatusCode::SERVICE_UNAVAILABLE
            },
            Self::Internal(msg) => {
                error!(error = %msg, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            },
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
