//! Snapshot engine for cfsnap.
//!
//! This crate walks a source tree once and mirrors it into an output tree of
//! CatalogFS records: one directory per source directory, one small record
//! file per source regular file, and no content ever copied.
//!
//! # Example
//!
//! ```rust,no_run
//! use cfsnap_core::SnapshotPolicy;
//! use cfsnap_index::Snapshotter;
//!
//! let policy = SnapshotPolicy::builder()
//!     .source_root("/media/cdrom")
//!     .output_root("/home/user/my_music_collection")
//!     .compute_hash(true)
//!     .build()
//!     .unwrap();
//!
//! let report = Snapshotter::new().snapshot(&policy).unwrap();
//! println!("{} records written, {} errors", report.files_written, report.error_count());
//! ```
//!
//! # Progress monitoring
//!
//! Subscribe before running to receive periodic progress snapshots:
//!
//! ```rust,no_run
//! use cfsnap_index::Snapshotter;
//!
//! let engine = Snapshotter::new();
//! let mut progress_rx = engine.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         eprintln!("{} files done", progress.files_done());
//!     }
//! });
//! ```

mod digest;
mod extract;
mod output;
mod progress;
mod resume;
mod snapshot;

pub use digest::{ContentHasher, Sha256Hasher};
pub use extract::{ExtractError, extract, stat_record};
pub use progress::SnapshotProgress;
pub use resume::ResumeTracker;
pub use snapshot::{SnapshotReport, Snapshotter, snapshot};

// Re-export core types for convenience
pub use cfsnap_core::{
    CaptureMode, EntryWarning, FileRecord, RecordError, SnapshotError, SnapshotPolicy,
    WarningKind,
};
