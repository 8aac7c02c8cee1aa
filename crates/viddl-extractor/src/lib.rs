#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! `yt-dlp` backed job runner.
//!
//! Layout: `command.rs` (subprocess execution), `plan.rs` (argument building and
//! provider rules), `policy.rs` (failure classification and the retry/fallback
//! state machine), `metadata.rs` (tool JSON records), `formats.rs` (quality
//! enumeration), `orchestrator.rs` (`JobOrchestrator`, the `JobRunner` impl).

pub mod command;
pub mod formats;
pub mod metadata;
pub mod orchestrator;
pub mod plan;
pub mod policy;

pub use command::{ProcessRunner, ToolOutput, ToolRunner, ToolStatus};
pub use orchestrator::{JobOrchestrator, OrchestratorSettings};
pub use plan::{
    DEFAULT_FORMAT_EXPRESSION, ExtractorArgs, JobPlan, PlanBuilder, PlanSettings, ProviderRule,
};
pub use policy::{AttemptDecision, AttemptState, FailureClass, RetryPolicy, classify};
