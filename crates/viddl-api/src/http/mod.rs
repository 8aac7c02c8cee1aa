//! HTTP surface: routing, middleware, and handlers.

/// Optional shared-secret check.
pub(crate) mod auth;
pub(crate) mod client;
/// Header names, problem URIs, and transfer tuning.
pub(crate) mod constants;
/// Problem response helpers and error types.
pub(crate) mod errors;
/// Rate and concurrency admission middleware.
pub(crate) mod gates;
/// Health and diagnostics endpoints.
pub(crate) mod health;
pub(crate) mod jobs;
pub(crate) mod rate_limit;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub(crate) mod telemetry;
pub(crate) mod transfer;
