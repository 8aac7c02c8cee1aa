//! Job orchestration: probe, plan, attempt, locate, describe.
//!
//! # Design
//! - One deadline covers every attempt of a download; backoff that would cross
//!   it ends the job instead of sleeping.
//! - Each attempt runs a freshly built plan. Retries rebuild it with the same
//!   arguments and whatever is left of the deadline; a fallback rebuilds it
//!   with the default format.
//! - The multi-item listing is advisory: if it fails, the target is probed as a
//!   single item.
//! - Tool diagnostics are logged, never returned; callers only see constant
//!   error messages.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};
use viddl_core::{
    Artifact, FormatChoice, JobError, JobKind, JobOutcome, JobRequest, JobResult, JobRunner,
    MediaInfo, MultiItemSummary, TargetUrl,
};
use viddl_fsops::{ArtifactStore, SessionId};
use viddl_telemetry::{Metrics, current_request_id, current_route};

use crate::command::{ToolOutput, ToolRunner};
use crate::formats::enumerate_video_formats;
use crate::metadata::{parse_listing, parse_media_record};
use crate::plan::{JobPlan, PlanBuilder};
use crate::policy::{AttemptDecision, AttemptState, RetryPolicy, classify};

const DIAGNOSTIC_EXCERPT_CHARS: usize = 500;

/// Limits and identity of the extraction backend.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Executable name, reported when it cannot be started.
    pub binary: String,
    /// Budget shared by every attempt of a download or extraction.
    pub job_timeout: Duration,
    /// Budget for each probe invocation.
    pub probe_timeout: Duration,
    /// Retry limits.
    pub retry: RetryPolicy,
}

/// [`JobRunner`] driving the extraction tool through a [`ToolRunner`].
pub struct JobOrchestrator {
    runner: Arc<dyn ToolRunner>,
    store: ArtifactStore,
    plans: PlanBuilder,
    settings: OrchestratorSettings,
    telemetry: Metrics,
    version: OnceCell<String>,
}

struct InFlight<'a>(&'a Metrics);

impl<'a> InFlight<'a> {
    fn enter(telemetry: &'a Metrics) -> Self {
        telemetry.job_started();
        Self(telemetry)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.job_finished();
    }
}

impl JobOrchestrator {
    /// Assemble an orchestrator.
    #[must_use]
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        store: ArtifactStore,
        plans: PlanBuilder,
        settings: OrchestratorSettings,
        telemetry: Metrics,
    ) -> Self {
        Self {
            runner,
            store,
            plans,
            settings,
            telemetry,
            version: OnceCell::new(),
        }
    }

    fn unavailable(&self, source: Option<io::Error>) -> JobError {
        JobError::ToolUnavailable {
            binary: self.settings.binary.clone(),
            source,
        }
    }

    async fn invoke(&self, kind: JobKind, plan: &JobPlan) -> JobResult<ToolOutput> {
        self.telemetry.inc_job_attempt(kind.label());
        debug!(kind = kind.label(), args = ?plan.args, "invoking extraction tool");
        self.runner.execute(plan).await.map_err(|source| {
            warn!(error = %source, binary = %self.settings.binary, "extraction tool could not be started");
            self.unavailable(Some(source))
        })
    }

    async fn probe(&self, target: &TargetUrl) -> JobResult<JobOutcome> {
        if self.plans.skips_listing(target) {
            debug!(host = target.host(), "single-item target; listing skipped");
        } else {
            let plan = self.plans.listing_plan(target, self.settings.probe_timeout);
            match self.invoke(JobKind::Probe, &plan).await {
                Ok(output) if output.succeeded() => {
                    let entries = parse_listing(&output.stdout);
                    if entries.len() > 1 {
                        info!(host = target.host(), entries = entries.len(), "multi-item target");
                        return Ok(JobOutcome::MultiItem(MultiItemSummary::new(entries)));
                    }
                }
                Ok(output) => {
                    debug!(
                        diagnostics = %output.excerpt(DIAGNOSTIC_EXCERPT_CHARS),
                        "listing failed; probing as single item"
                    );
                }
                Err(err) => debug!(error = %err, "listing failed; probing as single item"),
            }
        }

        let plan = self.plans.metadata_plan(target, self.settings.probe_timeout);
        let output = self.invoke(JobKind::Probe, &plan).await?;
        if !output.succeeded() {
            warn!(
                host = target.host(),
                status = ?output.status,
                diagnostics = %output.excerpt(DIAGNOSTIC_EXCERPT_CHARS),
                "metadata probe failed"
            );
            return Err(JobError::ExtractionFailed {
                operation: "probe",
                attempts: 1,
            });
        }
        let record = parse_media_record(&output.stdout).inspect_err(|err| {
            warn!(error = %err, host = target.host(), "metadata probe returned unreadable output");
        })?;
        let formats = enumerate_video_formats(&record, self.plans.size_heuristic(target));
        Ok(JobOutcome::Info(MediaInfo {
            title: record.title,
            thumbnail: record.thumbnail,
            duration: record.duration,
            uploader: record.uploader,
            formats,
        }))
    }

    async fn fetch(&self, request: &JobRequest) -> JobResult<Artifact> {
        let kind = request.kind();
        let target = request.target();
        let session = self.store.new_session();
        let template = self.store.output_template(&session);
        let deadline = Instant::now() + self.settings.job_timeout;
        let fallback_allowed = kind == JobKind::Video && request.format().is_specific();
        let failed = |attempts| JobError::ExtractionFailed {
            operation: kind.label(),
            attempts,
        };

        let mut format = request.format().clone();
        let mut state = AttemptState::default();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(kind = kind.label(), session = %session, attempts = state.attempts, "job deadline exhausted");
                return Err(failed(state.attempts));
            }
            let plan = self.plans.media_plan(
                target,
                kind,
                &format,
                request.item_index(),
                &template,
                remaining,
            );
            state.attempts += 1;
            let output = self.invoke(kind, &plan).await?;
            if output.succeeded() {
                debug!(kind = kind.label(), session = %session, attempts = state.attempts, "extraction succeeded");
                break;
            }

            let class = classify(&output);
            warn!(
                kind = kind.label(),
                session = %session,
                attempt = state.attempts,
                class = ?class,
                status = ?output.status,
                diagnostics = %output.excerpt(DIAGNOSTIC_EXCERPT_CHARS),
                "extraction attempt failed"
            );
            match self.settings.retry.decide(&state, class, fallback_allowed) {
                AttemptDecision::Retry { backoff } => {
                    if backoff >= deadline.saturating_duration_since(Instant::now()) {
                        warn!(session = %session, "backoff would exceed job deadline");
                        return Err(failed(state.attempts));
                    }
                    info!(
                        session = %session,
                        next_attempt = state.attempts + 1,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        "retrying extraction"
                    );
                    tokio::time::sleep(backoff).await;
                }
                AttemptDecision::Fallback => {
                    state.fallback_used = true;
                    self.telemetry.inc_job_fallback();
                    info!(session = %session, requested = ?format, "requested format unavailable; falling back to default");
                    format = FormatChoice::Best;
                }
                AttemptDecision::Fail => return Err(failed(state.attempts)),
            }
        }

        self.locate(kind, session).await
    }

    async fn locate(&self, kind: JobKind, session: SessionId) -> JobResult<Artifact> {
        let root = self.store.root().to_path_buf();
        let store = self.store.clone();
        let matches = tokio::task::spawn_blocking(move || store.matching_artifacts(&session))
            .await
            .map_err(|err| JobError::io("artifact.locate", &root, io::Error::other(err)))?
            .map_err(|err| JobError::io("artifact.locate", &root, io::Error::other(err)))?;

        let Some(path) = matches.first().cloned() else {
            warn!(session = %session, "tool succeeded but no artifact matched the session");
            return Err(JobError::ArtifactMissing {
                session: session.to_string(),
            });
        };
        if matches.len() > 1 {
            warn!(session = %session, count = matches.len(), "several artifacts matched one session; serving the first");
        }

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|source| JobError::io("artifact.stat", &path, source))?;
        let content_type = match kind {
            JobKind::Audio(codec) => codec.content_type(),
            JobKind::Video | JobKind::Probe => video_content_type(&path),
        };
        info!(
            session = %session,
            bytes = meta.len(),
            size_mb = meta.len() / (1024 * 1024),
            content_type,
            "artifact ready"
        );
        Ok(Artifact {
            display_name: self.store.display_name(&session, &path),
            size: meta.len(),
            content_type,
            path,
        })
    }
}

fn video_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => "video/mp4",
    }
}

#[async_trait]
impl JobRunner for JobOrchestrator {
    async fn run(&self, request: JobRequest) -> JobResult<JobOutcome> {
        let kind = request.kind();
        let _in_flight = InFlight::enter(&self.telemetry);
        let span = info_span!(
            "job",
            kind = kind.label(),
            host = request.target().host(),
            request_id = %current_request_id().unwrap_or_default(),
            route = %current_route().unwrap_or_default()
        );
        let result = async {
            match kind {
                JobKind::Probe => self.probe(request.target()).await,
                JobKind::Video | JobKind::Audio(_) => {
                    self.fetch(&request).await.map(JobOutcome::Artifact)
                }
            }
        }
        .instrument(span)
        .await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) if err.is_lifecycle() => "lifecycle_error",
            Err(_) => "failed",
        };
        self.telemetry.record_job(kind.label(), outcome);
        result
    }

    async fn tool_version(&self) -> JobResult<String> {
        self.version
            .get_or_try_init(|| async {
                let plan = PlanBuilder::version_plan(self.settings.probe_timeout);
                let output = self
                    .runner
                    .execute(&plan)
                    .await
                    .map_err(|source| self.unavailable(Some(source)))?;
                if output.succeeded() {
                    Ok(output.stdout.trim().to_string())
                } else {
                    Err(self.unavailable(None))
                }
            })
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ToolStatus;
    use crate::plan::{DEFAULT_FORMAT_EXPRESSION, PlanSettings, ProviderRule};
    use anyhow::{Result, anyhow};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use viddl_core::AudioCodec;

    const TEMPLATE_TAIL: &str = "%(title).80s.%(ext)s";

    /// One scripted tool response; `creates` names the file written on success.
    struct Step {
        status: ToolStatus,
        stdout: &'static str,
        stderr: &'static str,
        creates: &'static [&'static str],
    }

    impl Step {
        const fn ok(stdout: &'static str) -> Self {
            Self {
                status: ToolStatus::Success,
                stdout,
                stderr: "",
                creates: &[],
            }
        }

        const fn writes(creates: &'static [&'static str]) -> Self {
            Self {
                status: ToolStatus::Success,
                stdout: "",
                stderr: "",
                creates,
            }
        }

        const fn fails(stderr: &'static str) -> Self {
            Self {
                status: ToolStatus::Failed(Some(1)),
                stdout: "",
                stderr,
                creates: &[],
            }
        }
    }

    #[derive(Default)]
    struct ScriptedRunner {
        steps: Mutex<VecDeque<Step>>,
        seen: Mutex<Vec<JobPlan>>,
        unavailable: bool,
    }

    impl ScriptedRunner {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                ..Self::default()
            })
        }

        fn plans(&self) -> Vec<JobPlan> {
            self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ToolRunner for ScriptedRunner {
        async fn execute(&self, plan: &JobPlan) -> io::Result<ToolOutput> {
            if self.unavailable {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such binary"));
            }
            self.seen
                .lock()
                .map_err(|_| io::Error::other("poisoned"))?
                .push(plan.clone());
            let step = self
                .steps
                .lock()
                .map_err(|_| io::Error::other("poisoned"))?
                .pop_front()
                .ok_or_else(|| io::Error::other("script exhausted"))?;
            if let Some(template) = &plan.output_template {
                let template = template.to_string_lossy();
                for name in step.creates {
                    std::fs::write(template.replace(TEMPLATE_TAIL, name), b"media-bytes")?;
                }
            }
            Ok(ToolOutput {
                status: step.status,
                stdout: step.stdout.into(),
                stderr: step.stderr.into(),
            })
        }
    }

    struct Harness {
        _temp: TempDir,
        orchestrator: JobOrchestrator,
        metrics: Metrics,
        allowed: Vec<String>,
    }

    fn harness(runner: Arc<ScriptedRunner>) -> Result<Harness> {
        let temp = tempfile::tempdir()?;
        let metrics = Metrics::new()?;
        let store = ArtifactStore::new(temp.path(), metrics.clone());
        let plans = PlanBuilder::new(
            PlanSettings {
                max_filesize: "2G".into(),
                cookies_file: None,
                single_item_hosts: vec!["youtube.com".into(), "youtu.be".into()],
            },
            ProviderRule::builtin(),
        );
        let settings = OrchestratorSettings {
            binary: "yt-dlp".into(),
            job_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
            },
        };
        Ok(Harness {
            _temp: temp,
            orchestrator: JobOrchestrator::new(runner, store, plans, settings, metrics.clone()),
            metrics,
            allowed: vec!["youtube.com".into(), "vimeo.com".into()],
        })
    }

    impl Harness {
        fn request(&self, url: &str, format: FormatChoice, kind: JobKind) -> Result<JobRequest> {
            let target = TargetUrl::parse(url, &self.allowed)?;
            Ok(JobRequest::new(target, format, None, kind))
        }
    }

    fn format_arg(plan: &JobPlan) -> Option<&str> {
        plan.args
            .iter()
            .position(|arg| arg == "-f")
            .and_then(|idx| plan.args.get(idx + 1))
            .map(String::as_str)
    }

    fn artifact(outcome: JobOutcome) -> Result<Artifact> {
        match outcome {
            JobOutcome::Artifact(artifact) => Ok(artifact),
            other => Err(anyhow!("expected artifact, got {other:?}")),
        }
    }

    #[tokio::test]
    async fn transient_failures_retry_with_the_same_arguments() -> Result<()> {
        let runner = ScriptedRunner::new(vec![
            Step::fails("ERROR: HTTP Error 503: Service Unavailable"),
            Step::fails("ERROR: Connection reset by peer"),
            Step::writes(&["My_Clip.mp4"]),
        ]);
        let h = harness(runner.clone())?;
        let request = h.request("https://vimeo.com/1", FormatChoice::Best, JobKind::Video)?;

        let artifact = artifact(h.orchestrator.run(request).await?)?;

        let plans = runner.plans();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].args, plans[2].args);
        assert_eq!(plans[0].output_template, plans[2].output_template);
        // One deadline covers every attempt, so each budget is what the
        // previous attempts left over.
        assert!(plans[1].timeout <= plans[0].timeout);
        assert!(plans[2].timeout <= plans[1].timeout);
        assert!(plans[0].timeout <= Duration::from_secs(30));
        assert_eq!(artifact.display_name, "My_Clip.mp4");
        assert_eq!(artifact.content_type, "video/mp4");
        assert_eq!(artifact.size, 11);
        assert!(artifact.path.exists());
        assert_eq!(h.metrics.snapshot().jobs_in_flight, 0);
        Ok(())
    }

    #[tokio::test]
    async fn transient_failures_stop_at_max_attempts() -> Result<()> {
        let runner = ScriptedRunner::new(vec![
            Step::fails("HTTP Error 502"),
            Step::fails("HTTP Error 502"),
            Step::fails("HTTP Error 502"),
        ]);
        let h = harness(runner.clone())?;
        let request = h.request("https://vimeo.com/1", FormatChoice::Best, JobKind::Video)?;

        let err = h.orchestrator.run(request).await.err();

        assert!(matches!(
            err,
            Some(JobError::ExtractionFailed {
                operation: "video",
                attempts: 3
            })
        ));
        assert_eq!(runner.plans().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn format_failure_falls_back_exactly_once() -> Result<()> {
        let runner = ScriptedRunner::new(vec![
            Step::fails("ERROR: Requested format is not available"),
            Step::writes(&["clip.mp4"]),
        ]);
        let h = harness(runner.clone())?;
        let request = h.request(
            "https://vimeo.com/1",
            FormatChoice::Specific("137".into()),
            JobKind::Video,
        )?;

        h.orchestrator.run(request).await?;

        let plans = runner.plans();
        assert_eq!(plans.len(), 2);
        assert_eq!(format_arg(&plans[0]), Some("137+ba/137"));
        assert_eq!(format_arg(&plans[1]), Some(DEFAULT_FORMAT_EXPRESSION));
        assert_eq!(plans[0].output_template, plans[1].output_template);
        assert_eq!(h.metrics.snapshot().job_fallbacks_total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn failure_after_fallback_is_final() -> Result<()> {
        let runner = ScriptedRunner::new(vec![
            Step::fails("ERROR: Requested format is not available"),
            Step::fails("HTTP Error 503"),
        ]);
        let h = harness(runner.clone())?;
        let request = h.request(
            "https://vimeo.com/1",
            FormatChoice::Specific("22".into()),
            JobKind::Video,
        )?;

        let err = h.orchestrator.run(request).await.err();

        assert!(matches!(err, Some(JobError::ExtractionFailed { attempts: 2, .. })));
        assert_eq!(runner.plans().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn audio_never_falls_back() -> Result<()> {
        let runner = ScriptedRunner::new(vec![Step::fails("ERROR: format unavailable")]);
        let h = harness(runner.clone())?;
        let request = h.request(
            "https://vimeo.com/1",
            FormatChoice::Best,
            JobKind::Audio(AudioCodec::Opus),
        )?;

        let err = h.orchestrator.run(request).await.err();

        assert!(matches!(
            err,
            Some(JobError::ExtractionFailed {
                operation: "audio",
                attempts: 1
            })
        ));
        assert_eq!(h.metrics.snapshot().job_fallbacks_total, 0);
        Ok(())
    }

    #[tokio::test]
    async fn audio_artifact_uses_codec_content_type() -> Result<()> {
        let runner = ScriptedRunner::new(vec![Step::writes(&["song.opus"])]);
        let h = harness(runner)?;
        let request = h.request(
            "https://vimeo.com/1",
            FormatChoice::Best,
            JobKind::Audio(AudioCodec::Opus),
        )?;
        let artifact = artifact(h.orchestrator.run(request).await?)?;
        assert_eq!(artifact.content_type, "audio/opus");
        assert_eq!(artifact.display_name, "song.opus");
        Ok(())
    }

    #[tokio::test]
    async fn success_without_output_is_a_lifecycle_error() -> Result<()> {
        let runner = ScriptedRunner::new(vec![Step::writes(&[])]);
        let h = harness(runner)?;
        let request = h.request("https://vimeo.com/1", FormatChoice::Best, JobKind::Video)?;
        let err = h
            .orchestrator
            .run(request)
            .await
            .err()
            .ok_or_else(|| anyhow!("expected missing artifact"))?;
        assert!(matches!(err, JobError::ArtifactMissing { .. }));
        assert!(err.is_lifecycle());
        Ok(())
    }

    #[tokio::test]
    async fn several_matches_serve_the_first() -> Result<()> {
        let runner = ScriptedRunner::new(vec![Step::writes(&["b_part2.mp4", "a_part1.mp4"])]);
        let h = harness(runner)?;
        let request = h.request("https://vimeo.com/1", FormatChoice::Best, JobKind::Video)?;
        let artifact = artifact(h.orchestrator.run(request).await?)?;
        assert_eq!(artifact.display_name, "a_part1.mp4");
        Ok(())
    }

    #[tokio::test]
    async fn probe_reports_multi_item_listing() -> Result<()> {
        let runner = ScriptedRunner::new(vec![Step::ok(concat!(
            "{\"_type\":\"url\",\"title\":\"a\"}\n",
            "{\"_type\":\"url\",\"title\":\"b\"}\n",
        ))]);
        let h = harness(runner.clone())?;
        let request = h.request("https://vimeo.com/album/7", FormatChoice::Best, JobKind::Probe)?;

        let outcome = h.orchestrator.run(request).await?;

        let JobOutcome::MultiItem(summary) = outcome else {
            return Err(anyhow!("expected multi-item summary"));
        };
        assert_eq!(summary.title, "Multiple videos (2)");
        assert_eq!(summary.entries[1].index, 2);
        assert_eq!(runner.plans().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn probe_falls_through_failed_listing() -> Result<()> {
        let runner = ScriptedRunner::new(vec![
            Step::fails("ERROR: listing broke"),
            Step::ok(
                r#"{"title":"Solo","uploader":"me","duration":30.0,
                    "formats":[{"format_id":"18","vcodec":"avc1","height":360}]}"#,
            ),
        ]);
        let h = harness(runner)?;
        let request = h.request("https://vimeo.com/1", FormatChoice::Best, JobKind::Probe)?;

        let JobOutcome::Info(info) = h.orchestrator.run(request).await? else {
            return Err(anyhow!("expected single-item info"));
        };
        assert_eq!(info.title, "Solo");
        assert_eq!(info.uploader, "me");
        assert_eq!(info.formats.len(), 1);
        assert_eq!(info.formats[0].quality, "360p");
        Ok(())
    }

    #[tokio::test]
    async fn probe_skips_listing_for_single_item_hosts() -> Result<()> {
        let runner = ScriptedRunner::new(vec![Step::ok(r#"{"title":"Watch"}"#)]);
        let h = harness(runner.clone())?;
        let request = h.request(
            "https://www.youtube.com/watch?v=abc",
            FormatChoice::Best,
            JobKind::Probe,
        )?;

        h.orchestrator.run(request).await?;

        let plans = runner.plans();
        assert_eq!(plans.len(), 1);
        assert!(!plans[0].args.contains(&"--flat-playlist".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn probe_failure_is_opaque() -> Result<()> {
        let runner = ScriptedRunner::new(vec![Step::fails("ERROR: private video /home/secret")]);
        let h = harness(runner)?;
        let request = h.request(
            "https://www.youtube.com/watch?v=abc",
            FormatChoice::Best,
            JobKind::Probe,
        )?;
        let err = h
            .orchestrator
            .run(request)
            .await
            .err()
            .ok_or_else(|| anyhow!("expected probe failure"))?;
        assert_eq!(err.to_string(), "operation failed");
        Ok(())
    }

    #[tokio::test]
    async fn missing_tool_is_reported_as_unavailable() -> Result<()> {
        let runner = Arc::new(ScriptedRunner {
            unavailable: true,
            ..ScriptedRunner::default()
        });
        let h = harness(runner)?;
        let request = h.request("https://vimeo.com/1", FormatChoice::Best, JobKind::Video)?;
        assert!(matches!(
            h.orchestrator.run(request).await.err(),
            Some(JobError::ToolUnavailable { .. })
        ));
        assert!(h.orchestrator.tool_version().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn tool_version_is_cached_after_success() -> Result<()> {
        let runner = ScriptedRunner::new(vec![Step::ok("2024.08.06\n")]);
        let h = harness(runner.clone())?;
        assert_eq!(h.orchestrator.tool_version().await?, "2024.08.06");
        assert_eq!(h.orchestrator.tool_version().await?, "2024.08.06");
        assert_eq!(runner.plans().len(), 1);
        Ok(())
    }
}
