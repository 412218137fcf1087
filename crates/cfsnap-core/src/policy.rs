//! Run configuration: which fields to capture and how to walk.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::record::CaptureMode;

/// Immutable configuration for one snapshot run.
///
/// Every component's behavior is a pure function of the entry being processed
/// and this policy; there is no ambient run state.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SnapshotPolicy {
    /// Root of the tree to catalog.
    pub source_root: PathBuf,

    /// Root of the mirrored output tree.
    pub output_root: PathBuf,

    /// Which metadata subset to capture.
    #[builder(default)]
    #[serde(default)]
    pub capture: CaptureMode,

    /// Compute and store SHA-256 digests (much slower).
    #[builder(default = "false")]
    #[serde(default)]
    pub compute_hash: bool,

    /// Skip output entries that already exist and decode cleanly.
    #[builder(default = "false")]
    #[serde(default)]
    pub resume: bool,

    /// The source tree already contains catalog records; read metadata from
    /// their content instead of stat, and never touch original data.
    #[builder(default = "false")]
    #[serde(default)]
    pub source_is_catalog: bool,

    /// Worker threads for per-file work (0 = rayon default).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Entry names to skip entirely (simple `*` prefix/suffix globs).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

impl SnapshotPolicyBuilder {
    fn validate(&self) -> Result<(), String> {
        match (&self.source_root, &self.output_root) {
            (Some(s), _) if s.as_os_str().is_empty() => {
                return Err("source root cannot be empty".to_string());
            }
            (_, Some(o)) if o.as_os_str().is_empty() => {
                return Err("output root cannot be empty".to_string());
            }
            (None, _) => return Err("source root is required".to_string()),
            (_, None) => return Err("output root is required".to_string()),
            _ => {}
        }

        // Catalog records carry no original content, so there is nothing to
        // hash; existing digests are carried over instead.
        if self.source_is_catalog.unwrap_or(false) && self.compute_hash.unwrap_or(false) {
            return Err(
                "hash computation cannot be combined with a catalog source".to_string(),
            );
        }
        Ok(())
    }
}

impl SnapshotPolicy {
    /// Create a new policy builder.
    pub fn builder() -> SnapshotPolicyBuilder {
        SnapshotPolicyBuilder::default()
    }

    /// Create a simple full-capture policy for a source/output pair.
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            capture: CaptureMode::Full,
            compute_hash: false,
            resume: false,
            source_is_catalog: false,
            threads: 0,
            ignore_patterns: Vec::new(),
        }
    }

    /// Check if an entry name should be skipped based on ignore patterns.
    pub fn should_ignore(&self, name: &str) -> bool {
        for pattern in &self.ignore_patterns {
            if name == pattern {
                return true;
            }
            if let Some(prefix) = pattern.strip_suffix('*') {
                if name.starts_with(prefix) {
                    return true;
                }
            }
            if let Some(suffix) = pattern.strip_prefix('*') {
                if name.ends_with(suffix) {
                    return true;
                }
            }
        }
        false
    }

    /// Whether the extractor will read file content at all this run.
    pub fn reads_content(&self) -> bool {
        self.compute_hash && !self.source_is_catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_builder() {
        let policy = SnapshotPolicy::builder()
            .source_root("/media/cdrom")
            .output_root("/home/user/snapshot")
            .capture(CaptureMode::DataOnly)
            .compute_hash(true)
            .threads(4usize)
            .build()
            .unwrap();

        assert_eq!(policy.source_root, PathBuf::from("/media/cdrom"));
        assert_eq!(policy.capture, CaptureMode::DataOnly);
        assert!(policy.compute_hash);
        assert!(!policy.resume);
        assert_eq!(policy.threads, 4);
    }

    #[test]
    fn test_policy_simple() {
        let policy = SnapshotPolicy::new("/src", "/dst");
        assert_eq!(policy.capture, CaptureMode::Full);
        assert!(!policy.compute_hash);
        assert!(!policy.source_is_catalog);
    }

    #[test]
    fn test_builder_requires_roots() {
        assert!(SnapshotPolicy::builder().build().is_err());
        assert!(SnapshotPolicy::builder().source_root("/src").build().is_err());
        assert!(
            SnapshotPolicy::builder()
                .source_root("")
                .output_root("/dst")
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_builder_rejects_hash_of_catalog_source() {
        let result = SnapshotPolicy::builder()
            .source_root("/src")
            .output_root("/dst")
            .source_is_catalog(true)
            .compute_hash(true)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_should_ignore() {
        let policy = SnapshotPolicy::builder()
            .source_root("/src")
            .output_root("/dst")
            .ignore_patterns(vec!["lost+found".to_string(), "*.tmp".to_string()])
            .build()
            .unwrap();

        assert!(policy.should_ignore("lost+found"));
        assert!(policy.should_ignore("scratch.tmp"));
        assert!(!policy.should_ignore("music"));
    }

    #[test]
    fn test_reads_content() {
        let mut policy = SnapshotPolicy::new("/src", "/dst");
        assert!(!policy.reads_content());
        policy.compute_hash = true;
        assert!(policy.reads_content());
        policy.compute_hash = false;
        policy.source_is_catalog = true;
        assert!(!policy.reads_content());
    }
}
