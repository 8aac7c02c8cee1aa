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

//! Engine-agnostic job domain types and the runner trait.
//!
//! Layout: `model.rs` (requests, outcomes, media metadata), `validate.rs`
//! (target URL and format parsing), `service.rs` (`JobRunner`), `error.rs`.

pub mod error;
pub mod model;
pub mod service;
pub mod validate;

pub use error::{JobError, JobResult};
pub use model::{
    Artifact, AudioCodec, ClientKey, FormatChoice, FormatOption, JobKind, JobOutcome, JobRequest,
    MediaEntry, MediaInfo, MultiItemSummary,
};
pub use service::JobRunner;
pub use validate::{MAX_FORMAT_ID_LEN, MAX_URL_LEN, TargetUrl};
