//! Building a [`FileRecord`] from a source entry.
//!
//! Two sources exist: the filesystem (lstat, plus an optional content
//! digest), and an existing catalog record (source-is-catalog mode), which is
//! decoded and re-projected without ever touching original data.

use std::fs::Metadata;
use std::io;
use std::path::Path;

use thiserror::Error;

use cfsnap_core::{FileRecord, RecordError, SnapshotPolicy, codec};

use crate::digest::ContentHasher;

/// Why extraction of one entry failed.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The entry could not be stat'd or its record file could not be read.
    #[error("cannot read entry: {0}")]
    Entry(#[from] io::Error),

    /// The content stream failed mid-hash.
    #[error("read failed while hashing: {0}")]
    Stream(io::Error),

    /// An existing record failed to decode.
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Produce the record for one regular file under the active policy.
///
/// `metadata` must come from `symlink_metadata` of `path`. The result is
/// already projected to the policy's capture mode.
pub fn extract(
    path: &Path,
    metadata: &Metadata,
    policy: &SnapshotPolicy,
    hasher: &dyn ContentHasher,
) -> Result<FileRecord, ExtractError> {
    let record = if policy.source_is_catalog {
        from_catalog_record(path, metadata)?
    } else {
        let mut record = stat_record(metadata);
        if policy.compute_hash {
            record.sha256 = Some(hasher.hash_file(path).map_err(ExtractError::Stream)?);
        }
        record
    };
    Ok(record.project(policy.capture))
}

/// Decode an existing record file and carry its fields over.
///
/// Digests present in the source record are kept as-is; they are never
/// recomputed because the original content no longer exists.
fn from_catalog_record(path: &Path, metadata: &Metadata) -> Result<FileRecord, ExtractError> {
    if metadata.len() > codec::MAX_RECORD_SIZE {
        return Err(RecordError::TooLarge(metadata.len()).into());
    }
    let bytes = std::fs::read(path)?;
    Ok(codec::decode_bytes(&bytes)?)
}

/// Build a full record from stat results.
#[cfg(unix)]
pub fn stat_record(metadata: &Metadata) -> FileRecord {
    use std::os::unix::fs::MetadataExt;

    FileRecord {
        size: Some(metadata.len()),
        blocks: Some(metadata.blocks()),
        mode: Some(metadata.mode()),
        uid: Some(metadata.uid()),
        gid: Some(metadata.gid()),
        atime: Some(metadata.atime()),
        mtime: Some(metadata.mtime()),
        ctime: Some(metadata.ctime()),
        atimensec: Some(nsec_part(metadata.atime_nsec())),
        mtimensec: Some(nsec_part(metadata.mtime_nsec())),
        ctimensec: Some(nsec_part(metadata.ctime_nsec())),
        nlink: Some(metadata.nlink()),
        blksize: Some(metadata.blksize()),
        sha256: None,
    }
}

/// Build a record from the portable subset of stat results.
#[cfg(not(unix))]
pub fn stat_record(metadata: &Metadata) -> FileRecord {
    let mtime = metadata.modified().ok().map(split_system_time);
    let atime = metadata.accessed().ok().map(split_system_time);
    let ctime = metadata.created().ok().map(split_system_time);

    FileRecord {
        size: Some(metadata.len()),
        atime: atime.map(|(s, _)| s),
        atimensec: atime.map(|(_, n)| n),
        mtime: mtime.map(|(s, _)| s),
        mtimensec: mtime.map(|(_, n)| n),
        ctime: ctime.map(|(s, _)| s),
        ctimensec: ctime.map(|(_, n)| n),
        ..FileRecord::default()
    }
}

#[cfg(unix)]
fn nsec_part(nsec: i64) -> u32 {
    nsec.rem_euclid(1_000_000_000) as u32
}

#[cfg(not(unix))]
fn split_system_time(time: std::time::SystemTime) -> (i64, u32) {
    match time.duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
        Err(e) => {
            let d = e.duration();
            // Pre-epoch timestamps round toward negative infinity.
            let secs = -(d.as_secs() as i64) - i64::from(d.subsec_nanos() > 0);
            let nanos = if d.subsec_nanos() > 0 {
                1_000_000_000 - d.subsec_nanos()
            } else {
                0
            };
            (secs, nanos)
        }
    }
}
