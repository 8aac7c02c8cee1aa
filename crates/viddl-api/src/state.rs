//! Shared state handed to every handler and middleware.

use std::sync::Arc;
use std::time::Duration;

use viddl_core::{FormatChoice, JobKind, JobRequest, JobRunner, TargetUrl};
use viddl_fsops::ArtifactStore;
use viddl_telemetry::Metrics;

use crate::admission::{ConcurrencyAdmission, RateAdmission};
use crate::http::errors::ApiError;
use crate::models::JobPayload;

/// Request-surface settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Hosts accepted as targets; subdomains match too.
    pub allowed_domains: Vec<String>,
    /// CORS origins.
    pub allowed_origins: Vec<String>,
    /// Shared secret for `/api/*`; `None` disables the check.
    pub api_key: Option<String>,
    /// Key clients by `X-Forwarded-For` instead of the peer address.
    pub trust_forwarded_for: bool,
    /// Delay between serving an artifact and deleting it.
    pub removal_delay: Duration,
}

/// Collaborators the server is assembled from.
pub struct ApiDependencies {
    /// Job backend.
    pub runner: Arc<dyn JobRunner>,
    /// Temp directory owning served artifacts.
    pub store: ArtifactStore,
    /// Per-client token buckets.
    pub rate: Arc<RateAdmission>,
    /// Per-client job caps.
    pub concurrency: Arc<ConcurrencyAdmission>,
    /// Shared metrics registry.
    pub telemetry: Metrics,
    /// Request-surface settings.
    pub settings: ApiSettings,
}

pub(crate) struct ApiState {
    pub(crate) runner: Arc<dyn JobRunner>,
    pub(crate) store: ArtifactStore,
    pub(crate) rate: Arc<RateAdmission>,
    pub(crate) concurrency: Arc<ConcurrencyAdmission>,
    pub(crate) telemetry: Metrics,
    pub(crate) settings: ApiSettings,
}

impl From<ApiDependencies> for ApiState {
    fn from(deps: ApiDependencies) -> Self {
        Self {
            runner: deps.runner,
            store: deps.store,
            rate: deps.rate,
            concurrency: deps.concurrency,
            telemetry: deps.telemetry,
            settings: deps.settings,
        }
    }
}

impl ApiState {
    /// Validate a payload into a job. Audio jobs ignore `format`.
    pub(crate) fn job_request(
        &self,
        payload: &JobPayload,
        kind: JobKind,
    ) -> Result<JobRequest, ApiError> {
        let raw_url = payload.url.trim();
        if raw_url.is_empty() {
            return Err(
                ApiError::bad_request("URL is required").with_invalid_param("url", "URL is required"),
            );
        }
        let target = TargetUrl::parse(raw_url, &self.settings.allowed_domains)
            .map_err(|err| ApiError::from_job(&err))?;
        let format = match kind {
            JobKind::Audio(_) => FormatChoice::Best,
            JobKind::Video | JobKind::Probe => FormatChoice::parse(payload.format.as_deref())
                .map_err(|err| ApiError::from_job(&err))?,
        };
        Ok(JobRequest::new(target, format, payload.video_index, kind))
    }
}
