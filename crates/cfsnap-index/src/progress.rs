//! Snapshot progress reporting.

use std::path::PathBuf;
use std::time::Duration;

/// Progress information during a snapshot run.
#[derive(Debug, Clone, Default)]
pub struct SnapshotProgress {
    /// Record files written so far.
    pub files_written: u64,
    /// Files skipped by the resume tracker.
    pub files_skipped: u64,
    /// Output directories created so far.
    pub dirs_created: u64,
    /// Bytes streamed through the hasher so far.
    pub bytes_hashed: u64,
    /// Per-entry errors so far.
    pub errors_count: u64,
    /// Most recent source path processed.
    pub current_path: PathBuf,
    /// Time elapsed since the run started.
    pub elapsed: Duration,
}

impl SnapshotProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Files handled so far, written or skipped.
    pub fn files_done(&self) -> u64 {
        self.files_written + self.files_skipped
    }

    /// Processing rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_done() as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Hashing throughput in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes_hashed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}
