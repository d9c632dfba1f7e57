//! HTTP trigger endpoint.
//!
//! Each `POST /` carries one "file added" event and runs one invocation. A
//! `5xx` answer tells the trigger to re-deliver; handled outcomes (including
//! recorded ingestion failures) answer `200`.

use crate::Error;
use crate::pipeline::{Handled, StreamingHandler};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use filestream_core::FileEvent;
use serde::Serialize;

/// Build the trigger router.
///
/// - `POST /` - Handle one trigger event
/// - `GET /health` - Health check
pub fn router(handler: StreamingHandler) -> Router {
    Router::new()
        .route("/", post(trigger))
        .route("/health", get(health_check))
        .with_state(handler)
}

/// Response for a handled event.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerResponse {
    pub file_id: String,
    #[serde(flatten)]
    pub handled: Handled,
}

async fn trigger(
    State(handler): State<StreamingHandler>,
    body: Bytes,
) -> Result<Json<TriggerResponse>, ApiError> {
    let event = FileEvent::from_json(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let handled = handler.handle(&event).await?;
    Ok(Json(TriggerResponse {
        file_id: event.file_id().to_string(),
        handled,
    }))
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Trigger payload missing or invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Fatal fault; the trigger should re-deliver.
    #[error("internal error: {0}")]
    Internal(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(e) => Self::BadRequest(e.to_string()),
            other => Self::Internal(other),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Internal(err) => {
                tracing::error!(error = %err, "invocation aborted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    err.to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}
