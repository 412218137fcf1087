//! Deciding whether an output entry is already done.
//!
//! The output tree itself is the durability mechanism: no journal exists.
//! An entry counts as done only if its output file exists *and* decodes as a
//! record (existence alone would mistake a partially written file for
//! complete; combined with atomic writes this makes restart-after-crash
//! safe). Symlinks copied by a previous run count as done by existence.

use std::fs;
use std::path::Path;

use cfsnap_core::codec;

/// Skip decision for resumed runs.
#[derive(Debug, Clone, Copy)]
pub struct ResumeTracker {
    enabled: bool,
}

impl ResumeTracker {
    /// Create a tracker; `enabled = false` means nothing is ever skipped.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether resumption is active at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True if a well-formed record already exists at `output_path`.
    pub fn record_is_done(&self, output_path: &Path) -> bool {
        if !self.enabled {
            return false;
        }
        let Ok(metadata) = fs::symlink_metadata(output_path) else {
            return false;
        };
        if metadata.file_type().is_symlink() {
            // A prior run copied a symlink here; never reopen it.
            return true;
        }
        if !metadata.is_file() || metadata.len() > codec::MAX_RECORD_SIZE {
            return false;
        }
        match fs::read(output_path) {
            Ok(bytes) => codec::decode_bytes(&bytes).is_ok(),
            Err(_) => false,
        }
    }

    /// True if anything already occupies a symlink's output path.
    pub fn link_is_done(&self, output_path: &Path) -> bool {
        self.enabled && fs::symlink_metadata(output_path).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfsnap_core::{FileRecord, codec};

    #[test]
    fn test_disabled_never_skips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let record = FileRecord {
            size: Some(1),
            ..FileRecord::default()
        };
        std::fs::write(&path, codec::encode(&record)).unwrap();

        assert!(!ResumeTracker::new(false).record_is_done(&path));
        assert!(ResumeTracker::new(true).record_is_done(&path));
    }

    #[test]
    fn test_missing_output_is_not_done() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!ResumeTracker::new(true).record_is_done(&dir.path().join("missing")));
    }

    #[test]
    fn test_partial_write_is_not_done() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        // A record truncated mid-line, as a crash without atomic writes
        // would leave behind.
        std::fs::write(&path, "CatalogFS=3\nsi").unwrap();
        assert!(!ResumeTracker::new(true).record_is_done(&path));
    }

    #[test]
    fn test_directory_is_not_a_done_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::create_dir(&path).unwrap();
        assert!(!ResumeTracker::new(true).record_is_done(&path));
    }
}
