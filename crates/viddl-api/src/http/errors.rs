//! RFC9457-style API error wrapper.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;
use viddl_core::JobError;

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_CONCURRENCY_LIMITED, PROBLEM_EXTRACTION_FAILED, PROBLEM_INTERNAL,
    PROBLEM_RATE_LIMITED, PROBLEM_UNAUTHORIZED,
};
use crate::http::rate_limit::insert_rate_limit_headers;
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    invalid_params: Option<Vec<ProblemInvalidParam>>,
    rate_limit: Option<ErrorRateLimitContext>,
}

#[derive(Debug)]
struct ErrorRateLimitContext {
    limit: u32,
    remaining: u32,
    retry_after: Option<Duration>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
            rate_limit: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_param(mut self, field: &str, message: impl Into<String>) -> Self {
        self.invalid_params
            .get_or_insert_with(Vec::new)
            .push(ProblemInvalidParam {
                pointer: format!("/{field}"),
                message: message.into(),
            });
        self
    }

    pub(crate) const fn with_rate_limit_headers(
        mut self,
        limit: u32,
        remaining: u32,
        retry_after: Option<Duration>,
    ) -> Self {
        self.rate_limit = Some(ErrorRateLimitContext {
            limit,
            remaining,
            retry_after,
        });
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication required",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn too_many_requests(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            PROBLEM_RATE_LIMITED,
            "rate limit exceeded",
        )
        .with_detail(detail)
    }

    pub(crate) fn too_many_jobs(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            PROBLEM_CONCURRENCY_LIMITED,
            "too many concurrent jobs",
        )
        .with_detail(detail)
    }

    pub(crate) fn extraction_failed() -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            PROBLEM_EXTRACTION_FAILED,
            "extraction failed",
        )
        .with_detail("operation failed")
    }

    /// Map a job failure onto its client-facing class. Tool diagnostics never
    /// reach the response; lifecycle failures are logged here as contract breaks.
    pub(crate) fn from_job(err: &JobError) -> Self {
        match err {
            JobError::InvalidInput { field, reason, .. } => {
                Self::bad_request(*reason).with_invalid_param(field, *reason)
            }
            JobError::ExtractionFailed { .. }
            | JobError::ToolUnavailable { .. }
            | JobError::Metadata { .. } => Self::extraction_failed(),
            JobError::ArtifactMissing { .. } | JobError::Io { .. } => {
                error!(lifecycle = true, error = %err, detail = ?err, "artifact lifecycle failure");
                Self::internal("artifact unavailable")
            }
        }
    }

    #[cfg(test)]
    pub(crate) const fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub(crate) fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(rate) = self.rate_limit {
            insert_rate_limit_headers(
                response.headers_mut(),
                rate.limit,
                rate.remaining,
                rate.retry_after,
            );
        }
        response
    }
}
