//! Error types for job execution.
//!
//! # Design
//! - Constant messages; anything derived from tool output stays in fields and logs.
//! - Variants map one-to-one onto the client-facing failure classes: rejected
//!   input, failed extraction, and lifecycle problems with the temp directory.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Errors produced while validating or running a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// Request input failed validation; never retried.
    #[error("invalid job input")]
    InvalidInput {
        /// Request field that failed validation.
        field: &'static str,
        /// Client-facing description of the problem.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The extraction tool failed and no retry or fallback remains.
    #[error("operation failed")]
    ExtractionFailed {
        /// Stage that failed (`probe`, `download`, ...).
        operation: &'static str,
        /// Tool invocations spent on the job.
        attempts: u32,
    },
    /// The extraction tool could not be started or did not answer.
    #[error("extraction tool unavailable")]
    ToolUnavailable {
        /// Executable that was invoked.
        binary: String,
        /// Underlying spawn failure when one occurred.
        #[source]
        source: Option<io::Error>,
    },
    /// Tool metadata output could not be decoded.
    #[error("tool metadata could not be parsed")]
    Metadata {
        /// Stage that produced the payload.
        operation: &'static str,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The tool reported success but left no artifact behind.
    #[error("artifact not found")]
    ArtifactMissing {
        /// Session prefix that matched nothing.
        session: String,
    },
    /// Filesystem access around an artifact failed.
    #[error("artifact io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl JobError {
    /// Build an input rejection.
    #[must_use]
    pub fn invalid_input(field: &'static str, reason: &'static str, value: Option<&str>) -> Self {
        Self::InvalidInput {
            field,
            reason,
            value: value.map(ToString::to_string),
        }
    }

    /// Build an IO failure with context.
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// True when the failure concerns the temp directory rather than the tool.
    #[must_use]
    pub const fn is_lifecycle(&self) -> bool {
        matches!(self, Self::ArtifactMissing { .. } | Self::Io { .. })
    }
}
