//! Artifact storage directory: naming scheme, lookup, and liveness probing.
//!
//! # Design
//! - The store owns one directory; every artifact is named `<session>_<title>.<ext>`.
//! - Lookup is a prefix glob over file names, so a job never needs to know the
//!   final name the tool picked.
//! - Hidden entries (such as the liveness marker) are never artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use globset::Glob;
use viddl_telemetry::Metrics;

use crate::error::{FsOpsError, FsOpsResult};
use crate::session::SessionId;

/// Marker file written and removed by [`ArtifactStore::probe_writable`].
pub const HEALTH_MARKER: &str = ".health_check";

const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

/// Handle to the temporary artifact directory.
#[derive(Clone)]
pub struct ArtifactStore {
    pub(crate) root: PathBuf,
    pub(crate) telemetry: Metrics,
}

impl ArtifactStore {
    /// Wrap a directory; call [`ArtifactStore::ensure_dir`] before first use.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, telemetry: Metrics) -> Self {
        Self {
            root: root.into(),
            telemetry,
        }
    }

    /// Directory owned by the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory (and parents) when absent.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when the directory cannot be created.
    pub fn ensure_dir(&self) -> FsOpsResult<()> {
        fs::create_dir_all(&self.root)
            .map_err(|source| FsOpsError::io("store.ensure_dir", &self.root, source))
    }

    /// Allocate a session for a new job.
    #[must_use]
    pub fn new_session(&self) -> SessionId {
        SessionId::generate()
    }

    /// Output template handed to the extraction tool for `session`.
    ///
    /// Titles are truncated to 80 characters by the tool.
    #[must_use]
    pub fn output_template(&self, session: &SessionId) -> PathBuf {
        self.root
            .join(format!("{}%(title).80s.%(ext)s", session.prefix()))
    }

    /// Completed files carrying the session prefix, in sorted order.
    ///
    /// Partial download leftovers are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be listed or the pattern
    /// fails to compile.
    pub fn matching_artifacts(&self, session: &SessionId) -> FsOpsResult<Vec<PathBuf>> {
        let pattern = format!("{}*", session.prefix());
        let matcher = Glob::new(&pattern)
            .map_err(|source| FsOpsError::glob("store.matching_artifacts", pattern.clone(), source))?
            .compile_matcher();

        let entries = fs::read_dir(&self.root)
            .map_err(|source| FsOpsError::io("store.read_dir", &self.root, source))?;
        let mut matches = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|source| FsOpsError::io("store.read_entry", &self.root, source))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !matcher.is_match(&*name)
                || PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
            {
                continue;
            }
            let is_file = entry
                .file_type()
                .map_err(|source| FsOpsError::io("store.file_type", entry.path(), source))?
                .is_file();
            if is_file {
                matches.push(entry.path());
            }
        }
        matches.sort();
        Ok(matches)
    }

    /// File name shown to clients: the real name minus the session prefix.
    #[must_use]
    pub fn display_name(&self, session: &SessionId, path: &Path) -> String {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = session.prefix();
        name.strip_prefix(&prefix)
            .map_or_else(|| name.clone(), ToString::to_string)
    }

    /// Confirm the directory accepts writes by creating and removing the marker file.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when the marker cannot be written or removed.
    pub fn probe_writable(&self) -> FsOpsResult<()> {
        let marker = self.root.join(HEALTH_MARKER);
        fs::write(&marker, b"ok")
            .map_err(|source| FsOpsError::io("store.probe_write", &marker, source))?;
        fs::remove_file(&marker)
            .map_err(|source| FsOpsError::io("store.probe_remove", &marker, source))
    }
}
