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

//! HTTP front door for media jobs: admission control, job endpoints, and
//! artifact streaming.
//!
//! Layout: `admission/` (token buckets and concurrency caps), `http/` (router,
//! middleware, handlers), `models.rs` (request/response documents),
//! `state.rs` (shared handler state), `error.rs` (server errors).

pub mod admission;
pub mod error;
pub mod http;
pub mod models;
pub mod state;

pub use admission::{
    ConcurrencyAdmission, ConcurrencyPermit, RateAdmission, RateDecision, RateSettings,
};
pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use state::{ApiDependencies, ApiSettings};
