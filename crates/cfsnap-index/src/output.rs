//! Writing output entries.
//!
//! Record writes go through a temp file in the destination directory and a
//! rename, so a crash mid-write never leaves a file the resume tracker could
//! mistake for a finished record. After a write, the source entry's mode,
//! owner and times are restored onto the output entry on a best-effort basis
//! so the catalog tree itself resembles the source when browsed directly.

use std::fs::Metadata;
use std::io::{self, Write};
use std::path::Path;

use filetime::FileTime;
use tempfile::NamedTempFile;

/// Atomically write a record's text to `path`, replacing any existing file.
pub fn write_record(path: &Path, text: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Copy the source entry's mode, owner and times onto an output entry.
///
/// Failures here don't invalidate the record (the metadata of record lives in
/// its content), so they are logged at debug level and otherwise ignored.
pub fn restore_stats(path: &Path, source: &Metadata) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};

        let perms = std::fs::Permissions::from_mode(source.mode());
        if let Err(e) = std::fs::set_permissions(path, perms) {
            tracing::debug!(path = %path.display(), error = %e, "failed to restore mode");
        }
        if let Err(e) = std::os::unix::fs::chown(path, Some(source.uid()), Some(source.gid())) {
            tracing::debug!(path = %path.display(), error = %e, "failed to restore owner");
        }
    }

    let atime = FileTime::from_last_access_time(source);
    let mtime = FileTime::from_last_modification_time(source);
    if let Err(e) = filetime::set_file_times(path, atime, mtime) {
        tracing::debug!(path = %path.display(), error = %e, "failed to restore times");
    }
}
