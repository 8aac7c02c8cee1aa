//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - One handle is cloned into the HTTP layer, the job orchestrator and the
//!   artifact store; all of them share the same registry.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Admission stage that turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionGate {
    /// Token bucket was empty.
    Rate,
    /// Client already had the maximum number of jobs running.
    Concurrency,
}

impl AdmissionGate {
    /// Label value used in the exposition output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rate => "rate",
            Self::Concurrency => "concurrency",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    admission_rejections_total: IntCounterVec,
    jobs_total: IntCounterVec,
    job_attempts_total: IntCounterVec,
    job_fallbacks_total: IntCounter,
    jobs_in_flight: IntGauge,
    rate_buckets: IntGauge,
    artifacts_reclaimed_total: IntCounter,
    artifact_bytes_reclaimed_total: IntCounter,
    artifact_removal_failures_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting and tests.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Jobs currently executing.
    pub jobs_in_flight: i64,
    /// Token buckets currently tracked.
    pub rate_buckets: i64,
    /// Requests rejected by the token bucket.
    pub rate_rejections_total: u64,
    /// Requests rejected by the per-client job cap.
    pub concurrency_rejections_total: u64,
    /// Format fallbacks attempted.
    pub job_fallbacks_total: u64,
    /// Artifacts removed by timers or sweeps.
    pub artifacts_reclaimed_total: u64,
    /// Bytes freed by removed artifacts.
    pub artifact_bytes_reclaimed_total: u64,
    /// Removal attempts that failed.
    pub artifact_removal_failures_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let admission_rejections_total = counter_vec(
            "admission_rejections_total",
            "Requests rejected before reaching a job, by gate",
            &["gate"],
        )?;
        let jobs_total = counter_vec(
            "jobs_total",
            "Completed jobs by kind and outcome",
            &["kind", "outcome"],
        )?;
        let job_attempts_total = counter_vec(
            "job_attempts_total",
            "Extraction tool invocations by job kind",
            &["kind"],
        )?;
        let job_fallbacks_total = counter(
            "job_fallbacks_total",
            "Jobs that fell back to the default format expression",
        )?;
        let jobs_in_flight = gauge("jobs_in_flight", "Jobs currently executing")?;
        let rate_buckets = gauge("rate_buckets", "Token buckets currently tracked")?;
        let artifacts_reclaimed_total = counter(
            "artifacts_reclaimed_total",
            "Artifacts removed by scheduled removal or sweep",
        )?;
        let artifact_bytes_reclaimed_total = counter(
            "artifact_bytes_reclaimed_total",
            "Bytes freed by removed artifacts",
        )?;
        let artifact_removal_failures_total = counter(
            "artifact_removal_failures_total",
            "Artifact stat or removal failures",
        )?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(
            &registry,
            "admission_rejections_total",
            &admission_rejections_total,
        )?;
        register(&registry, "jobs_total", &jobs_total)?;
        register(&registry, "job_attempts_total", &job_attempts_total)?;
        register(&registry, "job_fallbacks_total", &job_fallbacks_total)?;
        register(&registry, "jobs_in_flight", &jobs_in_flight)?;
        register(&registry, "rate_buckets", &rate_buckets)?;
        register(
            &registry,
            "artifacts_reclaimed_total",
            &artifacts_reclaimed_total,
        )?;
        register(
            &registry,
            "artifact_bytes_reclaimed_total",
            &artifact_bytes_reclaimed_total,
        )?;
        register(
            &registry,
            "artifact_removal_failures_total",
            &artifact_removal_failures_total,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                admission_rejections_total,
                jobs_total,
                job_attempts_total,
                job_fallbacks_total,
                jobs_in_flight,
                rate_buckets,
                artifacts_reclaimed_total,
                artifact_bytes_reclaimed_total,
                artifact_removal_failures_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count a request turned away by an admission gate.
    pub fn inc_admission_rejection(&self, gate: AdmissionGate) {
        self.inner
            .admission_rejections_total
            .with_label_values(&[gate.as_str()])
            .inc();
    }

    /// Record the outcome of a finished job.
    pub fn record_job(&self, kind: &str, outcome: &str) {
        self.inner
            .jobs_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Count one invocation of the extraction tool.
    pub fn inc_job_attempt(&self, kind: &str) {
        self.inner
            .job_attempts_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Count a format fallback.
    pub fn inc_job_fallback(&self) {
        self.inner.job_fallbacks_total.inc();
    }

    /// Mark a job as started.
    pub fn job_started(&self) {
        self.inner.jobs_in_flight.inc();
    }

    /// Mark a job as finished, whatever its outcome.
    pub fn job_finished(&self) {
        self.inner.jobs_in_flight.dec();
    }

    /// Set the number of tracked token buckets.
    pub fn set_rate_buckets(&self, count: usize) {
        self.inner
            .rate_buckets
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Record artifacts removed from the temp directory and the bytes they held.
    pub fn record_reclaimed(&self, count: usize, bytes: u64) {
        self.inner
            .artifacts_reclaimed_total
            .inc_by(u64::try_from(count).unwrap_or(u64::MAX));
        self.inner.artifact_bytes_reclaimed_total.inc_by(bytes);
    }

    /// Count artifact stat or removal failures.
    pub fn inc_removal_failures(&self, count: usize) {
        self.inner
            .artifact_removal_failures_total
            .inc_by(u64::try_from(count).unwrap_or(u64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            jobs_in_flight: inner.jobs_in_flight.get(),
            rate_buckets: inner.rate_buckets.get(),
            rate_rejections_total: inner
                .admission_rejections_total
                .with_label_values(&[AdmissionGate::Rate.as_str()])
                .get(),
            concurrency_rejections_total: inner
                .admission_rejections_total
                .with_label_values(&[AdmissionGate::Concurrency.as_str()])
                .get(),
            job_fallbacks_total: inner.job_fallbacks_total.get(),
            artifacts_reclaimed_total: inner.artifacts_reclaimed_total.get(),
            artifact_bytes_reclaimed_total: inner.artifact_bytes_reclaimed_total.get(),
            artifact_removal_failures_total: inner.artifact_removal_failures_total.get(),
        }
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
