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

//! Environment-driven configuration for the viddl service.
//!
//! Layout: `model.rs` (typed settings grouped by concern), `defaults.rs`
//! (baseline values), `loader.rs` (environment parsing and validation),
//! `error.rs` (`ConfigError`).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    AdmissionConfig, AppConfig, ExtractorConfig, HttpConfig, LifecycleConfig, LogOutput,
    LoggingSettings,
};
