//! Artifact reclamation: post-serve timers and the periodic stale sweep.
//!
//! # Design
//! - Two independent paths remove artifacts. A one-shot timer fires shortly
//!   after a file is served; the sweep removes anything older than the max age,
//!   which also covers timers lost to a restart.
//! - Either path may find the file already gone; that is not an error.
//! - One bad entry never stops a sweep. Failures are counted and logged.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};
use crate::store::ArtifactStore;

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries removed.
    pub removed: usize,
    /// Bytes held by the removed entries.
    pub reclaimed_bytes: u64,
    /// Entries that could not be inspected or removed.
    pub failures: usize,
}

impl ArtifactStore {
    /// Remove `path` once `delay` has elapsed. Returns immediately.
    ///
    /// The returned handle only matters to tests; production callers drop it.
    pub fn schedule_removal(&self, path: PathBuf, delay: Duration) -> JoinHandle<()> {
        let telemetry = self.telemetry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let size = tokio::fs::metadata(&path)
                .await
                .map(|meta| meta.len())
                .unwrap_or(0);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    telemetry.record_reclaimed(1, size);
                    debug!(path = %path.display(), bytes = size, "scheduled artifact removal complete");
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "artifact already removed");
                }
                Err(err) => {
                    telemetry.inc_removal_failures(1);
                    warn!(error = %err, path = %path.display(), "scheduled artifact removal failed");
                }
            }
        })
    }

    /// Remove every non-hidden entry older than `max_age`.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] only when the directory itself cannot be listed.
    pub fn sweep_once(&self, max_age: Duration) -> FsOpsResult<SweepReport> {
        self.sweep_at(SystemTime::now(), max_age)
    }

    /// [`ArtifactStore::sweep_once`] against an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] only when the directory itself cannot be listed.
    pub fn sweep_at(&self, now: SystemTime, max_age: Duration) -> FsOpsResult<SweepReport> {
        let entries = fs::read_dir(&self.root)
            .map_err(|source| FsOpsError::io("sweep.read_dir", &self.root, source))?;

        let mut report = SweepReport::default();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    report.failures += 1;
                    warn!(error = %err, path = %self.root.display(), "failed to read sweep entry");
                    continue;
                }
            };
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) => {
                    report.failures += 1;
                    warn!(error = %err, path = %path.display(), "failed to stat artifact");
                    continue;
                }
            };
            let modified = match meta.modified() {
                Ok(modified) => modified,
                Err(err) => {
                    report.failures += 1;
                    warn!(error = %err, path = %path.display(), "failed to read artifact mtime");
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= max_age {
                continue;
            }

            let (removal, bytes) = if meta.is_dir() {
                let bytes = tree_size(&path);
                (fs::remove_dir_all(&path), bytes)
            } else {
                (fs::remove_file(&path), meta.len())
            };
            match removal {
                Ok(()) => {
                    report.removed += 1;
                    report.reclaimed_bytes += bytes;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    report.failures += 1;
                    warn!(error = %err, path = %path.display(), "failed to remove stale artifact");
                }
            }
        }

        self.telemetry
            .record_reclaimed(report.removed, report.reclaimed_bytes);
        self.telemetry.inc_removal_failures(report.failures);
        if report.removed > 0 {
            info!(
                removed = report.removed,
                reclaimed_mb = report.reclaimed_bytes / (1024 * 1024),
                failures = report.failures,
                "stale artifact sweep complete"
            );
        }
        Ok(report)
    }

    /// Sweep immediately, then every `interval`, for the life of the runtime.
    ///
    /// Sweeps run on the blocking pool; errors are logged and never end the loop.
    pub fn start_periodic_sweep(&self, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let pass = store.clone();
                match tokio::task::spawn_blocking(move || pass.sweep_once(max_age)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => {
                        warn!(error = %err, root = %store.root.display(), "artifact sweep failed");
                    }
                    Err(err) => warn!(error = %err, "artifact sweep task failed"),
                }
            }
        })
    }
}

/// Bytes held by regular files below `dir`. Unreadable entries count as zero.
fn tree_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
