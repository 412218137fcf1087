//! The catalog record type and its field-set projections.

use serde::{Deserialize, Serialize};

/// Which subset of metadata a run captures (and a decoded record carries).
///
/// Exactly one mode is active per run. `DataOnly` keeps just what is needed to
/// compare file *content* between two catalogs (size and digest);
/// `DataAndTime` adds the modification time; `Full` keeps everything the
/// filesystem reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureMode {
    /// All stat fields plus optional digest.
    #[default]
    Full,
    /// Size and digest only.
    DataOnly,
    /// Size, digest and modification time.
    DataAndTime,
}

/// One catalog record: the metadata of a single regular file.
///
/// Field names and meanings match the CatalogFS on-disk format. Every field is
/// optional; which fields are present depends on the [`CaptureMode`] the
/// record was written under and on what the platform could report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File size in bytes.
    pub size: Option<u64>,
    /// 512-byte blocks allocated.
    pub blocks: Option<u64>,
    /// Permission bits and file type (st_mode).
    pub mode: Option<u32>,
    /// Owner user id.
    pub uid: Option<u32>,
    /// Owner group id.
    pub gid: Option<u32>,
    /// Access time, whole seconds since the epoch.
    pub atime: Option<i64>,
    /// Modification time, whole seconds since the epoch.
    pub mtime: Option<i64>,
    /// Status-change time, whole seconds since the epoch.
    pub ctime: Option<i64>,
    /// Nanosecond part of the access time.
    pub atimensec: Option<u32>,
    /// Nanosecond part of the modification time.
    pub mtimensec: Option<u32>,
    /// Nanosecond part of the status-change time.
    pub ctimensec: Option<u32>,
    /// Number of hard links.
    pub nlink: Option<u64>,
    /// Preferred I/O block size.
    pub blksize: Option<u64>,
    /// Lowercase hex SHA-256 digest of the file content.
    pub sha256: Option<String>,
}

impl FileRecord {
    /// Create an empty record with no fields set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify which field set this record carries.
    ///
    /// The classification is a pure function of which fields are present, so
    /// a decoder needs no external context: any field outside the reduced
    /// sets means `Full`; `mtime` without stat fields means `DataAndTime`;
    /// otherwise `DataOnly`.
    pub fn field_set(&self) -> CaptureMode {
        let has_full_field = self.blocks.is_some()
            || self.mode.is_some()
            || self.uid.is_some()
            || self.gid.is_some()
            || self.atime.is_some()
            || self.ctime.is_some()
            || self.atimensec.is_some()
            || self.ctimensec.is_some()
            || self.nlink.is_some()
            || self.blksize.is_some();

        if has_full_field {
            CaptureMode::Full
        } else if self.mtime.is_some() || self.mtimensec.is_some() {
            CaptureMode::DataAndTime
        } else {
            CaptureMode::DataOnly
        }
    }

    /// Project this record down to the fields a capture mode keeps.
    ///
    /// `Full` keeps everything; `DataOnly` keeps size and digest;
    /// `DataAndTime` keeps the data-only set plus mtime. Projection never
    /// invents fields, so `record.project(m).field_set()` is at most `m`.
    pub fn project(&self, mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Full => self.clone(),
            CaptureMode::DataOnly => Self {
                size: self.size,
                sha256: self.sha256.clone(),
                ..Self::default()
            },
            CaptureMode::DataAndTime => Self {
                size: self.size,
                mtime: self.mtime,
                mtimensec: self.mtimensec,
                sha256: self.sha256.clone(),
                ..Self::default()
            },
        }
    }

    /// True if no fields are set at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> FileRecord {
        FileRecord {
            size: Some(4096),
            blocks: Some(8),
            mode: Some(0o100644),
            uid: Some(1000),
            gid: Some(1000),
            atime: Some(1_700_000_000),
            mtime: Some(1_700_000_100),
            ctime: Some(1_700_000_200),
            atimensec: Some(1),
            mtimensec: Some(2),
            ctimensec: Some(3),
            nlink: Some(1),
            blksize: Some(4096),
            sha256: Some("ab".repeat(32)),
        }
    }

    #[test]
    fn test_field_set_classification() {
        assert_eq!(full_record().field_set(), CaptureMode::Full);

        let data_only = FileRecord {
            size: Some(10),
            sha256: Some("cd".repeat(32)),
            ..FileRecord::default()
        };
        assert_eq!(data_only.field_set(), CaptureMode::DataOnly);

        let data_and_time = FileRecord {
            size: Some(10),
            mtime: Some(1_700_000_000),
            ..FileRecord::default()
        };
        assert_eq!(data_and_time.field_set(), CaptureMode::DataAndTime);
    }

    #[test]
    fn test_projection_containment() {
        let full = full_record();

        let data_only = full.project(CaptureMode::DataOnly);
        assert_eq!(data_only.size, full.size);
        assert_eq!(data_only.sha256, full.sha256);
        assert!(data_only.mtime.is_none());
        assert!(data_only.mode.is_none());

        let data_and_time = full.project(CaptureMode::DataAndTime);
        assert_eq!(data_and_time.size, full.size);
        assert_eq!(data_and_time.mtime, full.mtime);
        assert_eq!(data_and_time.mtimensec, full.mtimensec);
        assert!(data_and_time.atime.is_none());

        // DataAndTime minus mtime is exactly DataOnly.
        let mut stripped = data_and_time.clone();
        stripped.mtime = None;
        stripped.mtimensec = None;
        assert_eq!(stripped, data_only);
    }

    #[test]
    fn test_project_full_is_identity() {
        let full = full_record();
        assert_eq!(full.project(CaptureMode::Full), full);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let full = full_record();
        let once = full.project(CaptureMode::DataOnly);
        assert_eq!(once.project(CaptureMode::DataOnly), once);
    }
}
