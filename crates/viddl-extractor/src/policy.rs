//! Failure classification and the retry/fallback state machine.
//!
//! # Design
//! - Classification is a pure function of the exit status and diagnostic text.
//!   Transient markers are checked first, so a 503 mentioning a format still retries.
//! - Retries reuse the same plan with exponential backoff.
//! - A format failure on a client-chosen format gets exactly one fallback to the
//!   default expression; after that the job ends on any failure.

use std::time::Duration;

use crate::command::{ToolOutput, ToolStatus};

const TRANSIENT_MARKERS: &[&str] = &["HTTP Error 5", "timed out", "Connection reset"];
const FORMAT_MARKERS: &[&str] = &["format", "unavailable"];

/// Category of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network trouble or an upstream 5xx; worth retrying.
    Transient,
    /// The requested format could not be served.
    FormatUnavailable,
    /// Anything else.
    Fatal,
}

/// Classify a failed invocation.
#[must_use]
pub fn classify(output: &ToolOutput) -> FailureClass {
    if output.status == ToolStatus::TimedOut {
        return FailureClass::Transient;
    }
    let text = output.diagnostics();
    if TRANSIENT_MARKERS.iter().any(|marker| text.contains(marker)) {
        return FailureClass::Transient;
    }
    let lowered = text.to_lowercase();
    if FORMAT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return FailureClass::FormatUnavailable;
    }
    FailureClass::Fatal
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    /// Re-run the same plan after `backoff`.
    Retry {
        /// Delay before the next attempt.
        backoff: Duration,
    },
    /// Re-plan with the default format and run once more.
    Fallback,
    /// Give up.
    Fail,
}

/// Progress of one job through its attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptState {
    /// Invocations made so far, fallback included.
    pub attempts: u32,
    /// Whether the single fallback has been spent.
    pub fallback_used: bool,
}

/// Retry limits for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed for transient failures.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each one after.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }

    /// Decide the next step after an attempt failed with `class`.
    ///
    /// `fallback_allowed` is false for jobs with nothing to fall back from
    /// (best-quality video and all audio).
    #[must_use]
    pub fn decide(
        &self,
        state: &AttemptState,
        class: FailureClass,
        fallback_allowed: bool,
    ) -> AttemptDecision {
        if state.fallback_used {
            return AttemptDecision::Fail;
        }
        match class {
            FailureClass::Transient if state.attempts < self.max_attempts => {
                AttemptDecision::Retry {
                    backoff: self.backoff(state.attempts),
                }
            }
            FailureClass::FormatUnavailable if fallback_allowed => AttemptDecision::Fallback,
            _ => AttemptDecision::Fail,
        }
    }
}
