use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dairy_core::ingest::FetchError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "auth",
            message: message.into(),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        let status = match &err {
            FetchError::Auth => StatusCode::UNAUTHORIZED,
            FetchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            FetchError::Validation(_) => StatusCode::BAD_REQUEST,
            FetchError::Network(_) | FetchError::Server { .. } | FetchError::Malformed(_) => {
                StatusCode::BAD_GATEWAY
            }
        };

        if status == StatusCode::BAD_GATEWAY {
            tracing::error!(kind = err.kind(), error = %err, "upstream request failed");
            sentry_anyhow::capture_anyhow(&anyhow::Error::msg(err.to_string()));
        } else {
            tracing::warn!(kind = err.kind(), error = %err, "request rejected");
        }

        Self {
            status,
            kind: err.kind(),
            message: err.user_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"error": self.kind, "message": self.message})),
        )
            .into_response()
    }
}
