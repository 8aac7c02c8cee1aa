//! Subprocess execution for the extraction tool.
//!
//! # Design
//! - One invocation per plan; stdin is closed and both output streams are captured.
//! - The child is killed when its deadline passes or when the caller drops the future.
//! - A spawn failure is an `io::Error`; a non-zero exit is a normal [`ToolOutput`].

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::plan::JobPlan;

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    /// Exit code zero.
    Success,
    /// Non-zero exit, or terminated by a signal (`None`).
    Failed(Option<i32>),
    /// Killed after exceeding the plan timeout.
    TimedOut,
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit classification.
    pub status: ToolStatus,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// True when the tool exited cleanly.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.status, ToolStatus::Success)
    }

    /// Diagnostic text used for failure classification: stderr followed by stdout.
    #[must_use]
    pub fn diagnostics(&self) -> String {
        let mut text = String::with_capacity(self.stderr.len() + self.stdout.len() + 1);
        text.push_str(&self.stderr);
        if !self.stdout.is_empty() {
            text.push('\n');
            text.push_str(&self.stdout);
        }
        text
    }

    /// Trailing slice of the diagnostics, for logs.
    #[must_use]
    pub fn excerpt(&self, max_chars: usize) -> String {
        let text = self.diagnostics();
        let skip = text.chars().count().saturating_sub(max_chars);
        text.chars().skip(skip).collect::<String>().trim().to_string()
    }
}

/// Executes plans against the extraction tool.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `plan` to completion or until its timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns an IO error only when the process cannot be started or awaited.
    async fn execute(&self, plan: &JobPlan) -> io::Result<ToolOutput>;
}

/// [`ToolRunner`] that spawns the real executable.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: String,
}

impl ProcessRunner {
    /// Runner for the executable at `binary` (resolved through `PATH` when bare).
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Executable this runner invokes.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn execute(&self, plan: &JobPlan) -> io::Result<ToolOutput> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = cmd.spawn()?;
        debug!(binary = %self.binary, pid = ?child.id(), timeout_secs = plan.timeout.as_secs(), "extraction tool started");

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(plan.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                let status = if output.status.success() {
                    ToolStatus::Success
                } else {
                    ToolStatus::Failed(output.status.code())
                };
                Ok(ToolOutput {
                    status,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            Err(_) => {
                warn!(binary = %self.binary, timeout_secs = plan.timeout.as_secs(), "extraction tool timed out and was killed");
                Ok(ToolOutput {
                    status: ToolStatus::TimedOut,
                    stdout: String::new(),
                    stderr: format!("timed out after {}", humanize(plan.timeout)),
                })
            }
        }
    }
}

fn humanize(duration: Duration) -> String {
    if duration.as_secs() > 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
