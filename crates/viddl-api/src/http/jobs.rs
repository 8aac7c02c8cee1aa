//! Job endpoints: metadata probe, video download, audio extraction.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::Response,
};
use tracing::{info, warn};
use viddl_core::{AudioCodec, JobError, JobKind, JobOutcome};

use crate::http::errors::ApiError;
use crate::http::transfer::serve_artifact;
use crate::models::{JobPayload, MediaInfoResponse};
use crate::state::ApiState;

pub(crate) async fn media_info(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<JobPayload>, JsonRejection>,
) -> Result<Json<MediaInfoResponse>, ApiError> {
    let payload = read_payload(payload)?;
    let request = state.job_request(&payload, JobKind::Probe)?;
    match state.runner.run(request).await.map_err(|err| job_failure(&err))? {
        JobOutcome::Info(info) => Ok(Json(info.into())),
        JobOutcome::MultiItem(summary) => Ok(Json(summary.into())),
        JobOutcome::Artifact(_) => Err(ApiError::internal("unexpected job outcome")),
    }
}

pub(crate) async fn download(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<JobPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = read_payload(payload)?;
    run_transfer(&state, &payload, JobKind::Video).await
}

pub(crate) async fn extract_audio(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<JobPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = read_payload(payload)?;
    let codec = AudioCodec::from_request(payload.audio_format.as_deref());
    run_transfer(&state, &payload, JobKind::Audio(codec)).await
}

async fn run_transfer(
    state: &ApiState,
    payload: &JobPayload,
    kind: JobKind,
) -> Result<Response, ApiError> {
    let request = state.job_request(payload, kind)?;
    match state.runner.run(request).await.map_err(|err| job_failure(&err))? {
        JobOutcome::Artifact(artifact) => {
            info!(
                kind = kind.label(),
                bytes = artifact.size,
                file = %artifact.display_name,
                "serving artifact"
            );
            serve_artifact(state, &artifact).await
        }
        JobOutcome::Info(_) | JobOutcome::MultiItem(_) => {
            Err(ApiError::internal("unexpected job outcome"))
        }
    }
}

fn read_payload(payload: Result<Json<JobPayload>, JsonRejection>) -> Result<JobPayload, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn job_failure(err: &JobError) -> ApiError {
    if !err.is_lifecycle() {
        warn!(error = %err, detail = ?err, "job failed");
    }
    ApiError::from_job(err)
}
