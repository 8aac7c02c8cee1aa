//! Health and diagnostics endpoints.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::http::errors::ApiError;
use crate::models::HealthResponse;
use crate::state::ApiState;

/// Healthy when the extraction tool answers and the temp directory takes writes.
pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Response {
    let version = match state.runner.tool_version().await {
        Ok(version) => version,
        Err(err) => {
            warn!(error = %err, detail = ?err, "health check could not reach extraction tool");
            return unhealthy("yt-dlp not available");
        }
    };

    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.probe_writable()).await {
        Ok(Ok(())) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                version: Some(version),
                error: None,
            }),
        )
            .into_response(),
        Ok(Err(err)) => {
            warn!(error = %err, detail = ?err, "temp directory failed write probe");
            unhealthy("tmp directory not writable")
        }
        Err(err) => {
            error!(error = %err, "write probe task failed");
            unhealthy("tmp directory not writable")
        }
    }
}

fn unhealthy(reason: &'static str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse {
            status: "unhealthy",
            version: None,
            error: Some(reason),
        }),
    )
        .into_response()
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}
