//! Baseline values applied when the environment leaves a setting unset.
//!
//! # Design
//! - Keep every default in one place so operators can audit the shipped policy.
//! - Durations are stored in whole seconds to mirror how they are configured.

/// Default listener address.
pub const BIND_ADDR: &str = "0.0.0.0";
/// Default listener port.
pub const PORT: u16 = 3000;

/// Requests a client may burst before throttling starts.
pub const RATE_LIMIT_BURST: u32 = 3;
/// Seconds needed to earn back one request token.
pub const RATE_LIMIT_REFILL_SECS: u64 = 20;
/// Idle window after which a client's bucket is dropped.
pub const RATE_LIMIT_IDLE_SECS: u64 = 30 * 60;
/// Period of the idle-bucket evictor.
pub const RATE_LIMIT_EVICT_SECS: u64 = 10 * 60;
/// Simultaneous download jobs allowed per client.
pub const MAX_CONCURRENT_DOWNLOADS: u32 = 2;

/// Directory holding in-progress and served artifacts.
pub const TMP_DIR: &str = "./tmp";
/// Grace period between serving an artifact and deleting it.
pub const CLEANUP_DELAY_SECS: u64 = 60;
/// Period of the stale-artifact sweep.
pub const CLEANUP_INTERVAL_SECS: u64 = 5 * 60;
/// Age beyond which the sweep reclaims an artifact.
pub const CLEANUP_MAX_AGE_SECS: u64 = 15 * 60;

/// Extraction tool executable.
pub const YTDLP_BIN: &str = "yt-dlp";
/// Size ceiling handed to the extraction tool.
pub const MAX_DOWNLOAD_SIZE: &str = "2G";
/// Overall wall-clock budget for one job, shared by all attempts.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 10 * 60;
/// Budget for a single metadata probe.
pub const PROBE_TIMEOUT_SECS: u64 = 60;
/// Total attempts allowed for transient failures.
pub const DOWNLOAD_MAX_ATTEMPTS: u32 = 3;
/// Upper bound accepted for the attempt ceiling.
pub const DOWNLOAD_MAX_ATTEMPTS_LIMIT: u32 = 10;
/// Backoff before the first retry; doubles for each retry after it.
pub const RETRY_INITIAL_BACKOFF_MS: u64 = 1_000;

/// Default log level when `RUST_LOG` is absent.
pub const LOG_LEVEL: &str = "info";

/// Hosts accepted as download targets (subdomains included).
pub const ALLOWED_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "twitter.com",
    "x.com",
    "instagram.com",
    "facebook.com",
    "tiktok.com",
    "vimeo.com",
    "reddit.com",
    "twitch.tv",
    "threads.net",
];

/// Hosts whose URLs already name a single item unless they carry a list marker.
pub const SINGLE_ITEM_HOSTS: &[&str] = &["youtube.com", "youtu.be"];

/// Origins always allowed by CORS; `ALLOWED_ORIGINS` adds to these.
pub const ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:5173"];
