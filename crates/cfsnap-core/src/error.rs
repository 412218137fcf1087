//! Fatal errors and per-entry warnings.
//!
//! Only problems with the roots themselves abort a run. Everything that goes
//! wrong for a single entry becomes an [`EntryWarning`]: it is counted,
//! reported, and traversal continues, so one unreadable file on damaged
//! media cannot abort a multi-hour catalog run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::RecordError;

/// Errors that abort a snapshot run.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The source root does not exist or cannot be accessed.
    #[error("cannot access source root {path}: {source}")]
    SourceRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source root exists but is not a directory.
    #[error("source root is not a directory: {path}")]
    SourceNotADirectory { path: PathBuf },

    /// The output root cannot be created or accessed.
    #[error("cannot use output root {path}: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid run configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Kind of per-entry failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// An output directory could not be created.
    DirectoryCreate,
    /// A source entry vanished or could not be stat'd/read.
    EntryRead,
    /// A source file became unreadable mid-hash.
    StreamRead,
    /// An existing record failed to decode.
    MalformedRecord,
    /// The output record file could not be written.
    OutputWrite,
    /// Entry kind this tool does not catalog (socket, FIFO, device).
    UnsupportedKind,
}

/// Non-fatal failure for a single entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryWarning {
    /// Source path the failure belongs to.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of failure.
    pub kind: WarningKind,
}

impl EntryWarning {
    /// Create a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// A source entry could not be stat'd or read.
    pub fn entry_read(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(path, format!("cannot read entry: {error}"), WarningKind::EntryRead)
    }

    /// An output directory could not be created.
    pub fn directory_create(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(
            path,
            format!("cannot create directory: {error}"),
            WarningKind::DirectoryCreate,
        )
    }

    /// Hashing failed partway through a file.
    pub fn stream_read(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(
            path,
            format!("read failed while hashing: {error}"),
            WarningKind::StreamRead,
        )
    }

    /// An existing record could not be decoded.
    pub fn malformed_record(path: impl Into<PathBuf>, error: &RecordError) -> Self {
        Self::new(path, error.to_string(), WarningKind::MalformedRecord)
    }

    /// The output record could not be written.
    pub fn output_write(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(
            path,
            format!("cannot write record: {error}"),
            WarningKind::OutputWrite,
        )
    }

    /// Entry kind that is never cataloged.
    pub fn unsupported_kind(path: impl Into<PathBuf>) -> Self {
        Self::new(
            path,
            "not a regular file, directory or symlink",
            WarningKind::UnsupportedKind,
        )
    }
}
