//! Typed configuration sections.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Fully validated service configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// Listener and request-surface settings.
    pub http: HttpConfig,
    /// Per-client throttling and job caps.
    pub admission: AdmissionConfig,
    /// Temporary artifact storage policy.
    pub lifecycle: LifecycleConfig,
    /// External extraction tool settings.
    pub extractor: ExtractorConfig,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Listener and request-surface settings.
#[derive(Debug, Clone, Serialize)]
pub struct HttpConfig {
    /// Interface the listener binds to.
    pub bind_addr: IpAddr,
    /// Listener port, never zero.
    pub port: u16,
    /// CORS origins, each carrying an explicit scheme.
    pub allowed_origins: Vec<String>,
    /// Shared secret required on `/api/*` when set.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Derive client identity from `X-Forwarded-For` instead of the peer address.
    pub trust_forwarded_for: bool,
}

/// Per-client throttling and job caps.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionConfig {
    /// Token bucket capacity.
    pub rate_burst: u32,
    /// Time needed to earn back one token.
    pub refill_interval: Duration,
    /// Buckets untouched for this long are evicted.
    pub idle_ttl: Duration,
    /// Period of the eviction pass.
    pub evict_interval: Duration,
    /// Download jobs one client may run at once.
    pub max_concurrent_per_client: u32,
}

/// Temporary artifact storage policy.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleConfig {
    /// Directory owning every artifact.
    pub tmp_dir: PathBuf,
    /// Delay between serving an artifact and removing it.
    pub removal_delay: Duration,
    /// Period of the stale-artifact sweep.
    pub sweep_interval: Duration,
    /// Age past which the sweep reclaims a file.
    pub max_age: Duration,
}

/// External extraction tool settings.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractorConfig {
    /// Executable name or path.
    pub binary: String,
    /// Cookie jar handed to the tool when present.
    pub cookies_file: Option<PathBuf>,
    /// Size ceiling such as `2G` or `500M`.
    pub max_filesize: String,
    /// Hosts accepted as download targets.
    pub allowed_domains: Vec<String>,
    /// Overall budget for one job.
    pub job_timeout: Duration,
    /// Budget for one metadata probe.
    pub probe_timeout: Duration,
    /// Total attempts allowed for transient failures.
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Hosts that skip the listing probe unless the URL names a list.
    pub single_item_hosts: Vec<String>,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format; `None` lets the build profile decide.
    pub format: Option<LogOutput>,
}

/// Log output format requested by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}
