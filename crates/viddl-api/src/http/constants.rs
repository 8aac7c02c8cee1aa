//! Shared HTTP constants (headers, problem URIs, transfer tuning).

pub(crate) const HEADER_API_KEY: &str = "x-api-key";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_FORWARDED_FOR: &str = "x-forwarded-for";
pub(crate) const HEADER_RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub(crate) const HEADER_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub(crate) const HEADER_RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
pub(crate) const HEADER_CONTENT_DESCRIPTION: &str = "content-description";
pub(crate) const QUERY_API_KEY: &str = "api_key";

pub(crate) const PROBLEM_INTERNAL: &str = "https://viddl.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://viddl.dev/problems/unauthorized";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://viddl.dev/problems/bad-request";
pub(crate) const PROBLEM_RATE_LIMITED: &str = "https://viddl.dev/problems/rate-limited";
pub(crate) const PROBLEM_CONCURRENCY_LIMITED: &str =
    "https://viddl.dev/problems/concurrency-limited";
pub(crate) const PROBLEM_EXTRACTION_FAILED: &str = "https://viddl.dev/problems/extraction-failed";

pub(crate) const TRANSFER_CHUNK_BYTES: usize = 64 * 1024;
pub(crate) const CORS_MAX_AGE_SECS: u64 = 12 * 60 * 60;
pub(crate) const FALLBACK_DOWNLOAD_NAME: &str = "download";

pub(crate) const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "content-security-policy",
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'",
    ),
    (
        "permissions-policy",
        "geolocation=(), microphone=(), camera=()",
    ),
];
