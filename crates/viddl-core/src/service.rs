//! Runner trait implemented by extraction backends.

use async_trait::async_trait;

use crate::error::JobResult;
use crate::model::{JobOutcome, JobRequest};

/// Executes jobs against an extraction backend.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Drive one job to completion.
    async fn run(&self, request: JobRequest) -> JobResult<JobOutcome>;

    /// Report the backend version; used as a liveness probe.
    async fn tool_version(&self) -> JobResult<String>;
}
