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

//! Temporary artifact lifecycle: session naming, lookup, and reclamation.
//!
//! Layout: `session.rs` (`SessionId`), `store.rs` (`ArtifactStore` naming and
//! lookup), `reclaim.rs` (scheduled removal and the periodic sweep), `error.rs`.

pub mod error;
pub mod reclaim;
pub mod session;
pub mod store;

pub use error::{FsOpsError, FsOpsResult};
pub use reclaim::SweepReport;
pub use session::SessionId;
pub use store::{ArtifactStore, HEALTH_MARKER};
