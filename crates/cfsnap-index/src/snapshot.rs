//! The snapshot engine: walk a source tree once and mirror it as records.
//!
//! Directory structure is mirrored during the walk; regular files become
//! independent work units processed by a rayon pool (one unit per output
//! path, so no two workers ever write the same file). Per-entry failures are
//! collected as warnings and never abort the run.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use jwalk::{Parallelism, WalkDir};
use rayon::prelude::*;
use serde::Serialize;
use tokio::sync::broadcast;

use cfsnap_core::{EntryWarning, SnapshotError, SnapshotPolicy, WarningKind, codec};

use crate::digest::{ContentHasher, Sha256Hasher};
use crate::extract::{self, ExtractError};
use crate::output;
use crate::progress::SnapshotProgress;
use crate::resume::ResumeTracker;

/// How often (in processed files) a progress snapshot is broadcast.
const PROGRESS_EVERY: u64 = 256;

/// Outcome of one snapshot run.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotReport {
    /// Record files written.
    pub files_written: u64,
    /// Files skipped because a well-formed record already existed.
    pub files_skipped: u64,
    /// Output directories ensured.
    pub dirs_created: u64,
    /// Symlinks re-created in the output tree.
    pub symlinks_copied: u64,
    /// Bytes streamed through the hasher.
    pub bytes_hashed: u64,
    /// Per-entry failures; the run is complete for every entry not listed.
    pub warnings: Vec<EntryWarning>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl SnapshotReport {
    /// Number of entries that failed.
    pub fn error_count(&self) -> usize {
        self.warnings.len()
    }

    /// True when every entry succeeded.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// One regular file to catalog.
struct FileTask {
    source: PathBuf,
    output: PathBuf,
}

/// Snapshot engine with a pluggable hasher and progress broadcasting.
pub struct Snapshotter {
    progress_tx: broadcast::Sender<SnapshotProgress>,
    hasher: Arc<dyn ContentHasher>,
}

impl Snapshotter {
    /// Create an engine that hashes with SHA-256.
    pub fn new() -> Self {
        Self::with_hasher(Arc::new(Sha256Hasher))
    }

    /// Create an engine with a custom hashing strategy.
    pub fn with_hasher(hasher: Arc<dyn ContentHasher>) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            progress_tx,
            hasher,
        }
    }

    /// Subscribe to progress updates for the next run.
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotProgress> {
        self.progress_tx.subscribe()
    }

    /// Build the catalog for one policy.
    ///
    /// Visits every entry under the source root exactly once. Only problems
    /// with the roots themselves are fatal; everything else lands in the
    /// report's warnings. Nothing under the source root is ever modified.
    pub fn snapshot(&self, policy: &SnapshotPolicy) -> Result<SnapshotReport, SnapshotError> {
        let start = Instant::now();

        let source_root =
            fs::canonicalize(&policy.source_root).map_err(|e| SnapshotError::SourceRoot {
                path: policy.source_root.clone(),
                source: e,
            })?;
        let root_metadata = fs::metadata(&source_root).map_err(|e| SnapshotError::SourceRoot {
            path: source_root.clone(),
            source: e,
        })?;
        if !root_metadata.is_dir() {
            return Err(SnapshotError::SourceNotADirectory { path: source_root });
        }

        fs::create_dir_all(&policy.output_root).map_err(|e| SnapshotError::OutputRoot {
            path: policy.output_root.clone(),
            source: e,
        })?;
        let output_root =
            fs::canonicalize(&policy.output_root).map_err(|e| SnapshotError::OutputRoot {
                path: policy.output_root.clone(),
                source: e,
            })?;

        let mut warnings: Vec<EntryWarning> = Vec::new();
        let mut files: Vec<FileTask> = Vec::new();
        let mut links: Vec<FileTask> = Vec::new();
        // (source dir, output dir), root included, for the final stat pass.
        let mut dirs: Vec<(PathBuf, PathBuf)> = vec![(source_root.clone(), output_root.clone())];
        let mut dirs_created: u64 = 0;

        let parallelism = match policy.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };

        let walker = WalkDir::new(&source_root)
            .parallelism(parallelism)
            .skip_hidden(false)
            .follow_links(false)
            .sort(true);

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    warnings.push(EntryWarning::new(
                        path,
                        err.to_string(),
                        WarningKind::EntryRead,
                    ));
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let Ok(rel) = path.strip_prefix(&source_root) else {
                continue;
            };
            if rel
                .components()
                .any(|c| policy.should_ignore(&c.as_os_str().to_string_lossy()))
            {
                continue;
            }
            let out = output_root.join(rel);

            let file_type = entry.file_type();
            if file_type.is_dir() {
                match fs::create_dir_all(&out) {
                    Ok(()) => {
                        dirs_created += 1;
                        dirs.push((path.clone(), out));
                    }
                    Err(e) => warnings.push(EntryWarning::directory_create(&path, &e)),
                }
            } else if file_type.is_symlink() {
                links.push(FileTask {
                    source: path,
                    output: out,
                });
            } else if file_type.is_file() {
                files.push(FileTask {
                    source: path,
                    output: out,
                });
            } else {
                warnings.push(EntryWarning::unsupported_kind(&path));
            }
        }

        // Independent per-file work, one task per output path.
        let resume = ResumeTracker::new(policy.resume);
        let written = AtomicU64::new(0);
        let skipped = AtomicU64::new(0);
        let bytes_hashed = AtomicU64::new(0);
        let processed = AtomicU64::new(0);
        let shared_warnings = Mutex::new(warnings);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(policy.threads)
            .build()
            .map_err(|e| SnapshotError::InvalidConfig {
                message: e.to_string(),
            })?;

        pool.install(|| {
            files.par_iter().for_each(|task| {
                let outcome = self.process_file(task, policy, &resume);
                match outcome {
                    Ok(Processed::Written { hashed }) => {
                        written.fetch_add(1, Ordering::Relaxed);
                        bytes_hashed.fetch_add(hashed, Ordering::Relaxed);
                    }
                    Ok(Processed::Skipped) => {
                        skipped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(warning) => {
                        tracing::warn!(path = %warning.path.display(), "{}", warning.message);
                        shared_warnings.lock().unwrap().push(warning);
                    }
                }

                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_EVERY == 0 {
                    let _ = self.progress_tx.send(SnapshotProgress {
                        files_written: written.load(Ordering::Relaxed),
                        files_skipped: skipped.load(Ordering::Relaxed),
                        dirs_created,
                        bytes_hashed: bytes_hashed.load(Ordering::Relaxed),
                        errors_count: shared_warnings.lock().unwrap().len() as u64,
                        current_path: task.source.clone(),
                        elapsed: start.elapsed(),
                    });
                }
            });
        });

        let mut warnings = shared_warnings.into_inner().unwrap();
        let mut symlinks_copied: u64 = 0;
        let mut files_skipped = skipped.load(Ordering::Relaxed);

        for task in &links {
            match copy_symlink(task, &resume) {
                Ok(Processed::Written { .. }) => symlinks_copied += 1,
                Ok(Processed::Skipped) => files_skipped += 1,
                Err(warning) => warnings.push(warning),
            }
        }

        // Restore directory stats only after all writes: a restored
        // read-only mode must not block record creation. Children first so
        // parent timestamps are not churned by later writes below them.
        dirs.sort_by_key(|(src, _)| std::cmp::Reverse(src.components().count()));
        for (src, out) in &dirs {
            if let Ok(metadata) = fs::symlink_metadata(src) {
                output::restore_stats(out, &metadata);
            }
        }

        let report = SnapshotReport {
            files_written: written.load(Ordering::Relaxed),
            files_skipped,
            dirs_created,
            symlinks_copied,
            bytes_hashed: bytes_hashed.load(Ordering::Relaxed),
            warnings,
            duration: start.elapsed(),
        };

        let _ = self.progress_tx.send(SnapshotProgress {
            files_written: report.files_written,
            files_skipped: report.files_skipped,
            dirs_created: report.dirs_created,
            bytes_hashed: report.bytes_hashed,
            errors_count: report.warnings.len() as u64,
            current_path: PathBuf::new(),
            elapsed: report.duration,
        });

        Ok(report)
    }

    /// Extract, encode and write one file's record.
    fn process_file(
        &self,
        task: &FileTask,
        policy: &SnapshotPolicy,
        resume: &ResumeTracker,
    ) -> Result<Processed, EntryWarning> {
        if resume.record_is_done(&task.output) {
            tracing::debug!(path = %task.output.display(), "output record exists, skipping");
            return Ok(Processed::Skipped);
        }

        let metadata = fs::symlink_metadata(&task.source)
            .map_err(|e| EntryWarning::entry_read(&task.source, &e))?;
        if !metadata.is_file() {
            return Err(EntryWarning::new(
                &task.source,
                "entry changed type during the walk",
                WarningKind::EntryRead,
            ));
        }

        let record = extract::extract(&task.source, &metadata, policy, self.hasher.as_ref())
            .map_err(|e| match e {
                ExtractError::Entry(ref io) => EntryWarning::entry_read(&task.source, io),
                ExtractError::Stream(ref io) => EntryWarning::stream_read(&task.source, io),
                ExtractError::Record(ref rec) => EntryWarning::malformed_record(&task.source, rec),
            })?;

        let text = codec::encode(&record);
        output::write_record(&task.output, &text)
            .map_err(|e| EntryWarning::output_write(&task.output, &e))?;
        output::restore_stats(&task.output, &metadata);

        let hashed = if policy.reads_content() {
            metadata.len()
        } else {
            0
        };
        Ok(Processed::Written { hashed })
    }
}

impl Default for Snapshotter {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the catalog with the default SHA-256 engine.
pub fn snapshot(policy: &SnapshotPolicy) -> Result<SnapshotReport, SnapshotError> {
    Snapshotter::new().snapshot(policy)
}

enum Processed {
    Written { hashed: u64 },
    Skipped,
}

/// Re-create a source symlink at the output path, content never read.
#[cfg(unix)]
fn copy_symlink(task: &FileTask, resume: &ResumeTracker) -> Result<Processed, EntryWarning> {
    if resume.link_is_done(&task.output) {
        return Ok(Processed::Skipped);
    }

    let target =
        fs::read_link(&task.source).map_err(|e| EntryWarning::entry_read(&task.source, &e))?;

    if fs::symlink_metadata(&task.output).is_ok() {
        fs::remove_file(&task.output)
            .map_err(|e| EntryWarning::output_write(&task.output, &e))?;
    }
    std::os::unix::fs::symlink(&target, &task.output)
        .map_err(|e| EntryWarning::output_write(&task.output, &e))?;

    if let Ok(metadata) = fs::symlink_metadata(&task.source) {
        let atime = filetime::FileTime::from_last_access_time(&metadata);
        let mtime = filetime::FileTime::from_last_modification_time(&metadata);
        let _ = filetime::set_symlink_file_times(&task.output, atime, mtime);
    }
    Ok(Processed::Written { hashed: 0 })
}

#[cfg(not(unix))]
fn copy_symlink(task: &FileTask, _resume: &ResumeTracker) -> Result<Processed, EntryWarning> {
    Err(EntryWarning::new(
        &task.source,
        "symlinks are not supported on this platform",
        WarningKind::UnsupportedKind,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfsnap_core::{CaptureMode, FileRecord};
    use std::path::Path;
    use tempfile::TempDir;

    fn create_source_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("a.txt"), "abcd").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/b.txt"), "").unwrap();
        temp
    }

    fn decode_output(path: &Path) -> FileRecord {
        codec::decode_bytes(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_structure_is_mirrored() {
        let source = create_source_tree();
        let out = TempDir::new().unwrap();
        let policy = SnapshotPolicy::new(source.path(), out.path());

        let report = snapshot(&policy).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.files_written, 2);
        assert!(out.path().join("sub").is_dir());
        assert!(out.path().join("a.txt").is_file());
        assert!(out.path().join("sub/b.txt").is_file());
    }

    #[test]
    fn test_records_decode_with_expected_fields() {
        let source = create_source_tree();
        let out = TempDir::new().unwrap();
        let mut policy = SnapshotPolicy::new(source.path(), out.path());
        policy.compute_hash = true;

        snapshot(&policy).unwrap();

        let a = decode_output(&out.path().join("a.txt"));
        assert_eq!(a.size, Some(4));
        assert_eq!(
            a.sha256.as_deref(),
            Some("88d4266fd4e6338d13b845fcf289579d209c897823b9217da3e161936f031589")
        );
        assert_eq!(a.field_set(), CaptureMode::Full);

        let b = decode_output(&out.path().join("sub/b.txt"));
        assert_eq!(b.size, Some(0));
        assert_eq!(
            b.sha256.as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[test]
    fn test_output_is_record_not_content() {
        let source = create_source_tree();
        let out = TempDir::new().unwrap();
        let policy = SnapshotPolicy::new(source.path(), out.path());

        snapshot(&policy).unwrap();

        let bytes = fs::read(out.path().join("a.txt")).unwrap();
        assert_ne!(bytes, b"abcd");
        assert!(bytes.starts_with(b"CatalogFS=3\n"));
    }

    #[test]
    fn test_ignore_patterns_prune_subtrees() {
        let source = create_source_tree();
        let out = TempDir::new().unwrap();
        let policy = SnapshotPolicy::builder()
            .source_root(source.path())
            .output_root(out.path())
            .ignore_patterns(vec!["sub".to_string()])
            .build()
            .unwrap();

        let report = Snapshotter::new().snapshot(&policy).unwrap();

        assert_eq!(report.files_written, 1);
        assert!(!out.path().join("sub").exists());
    }

    #[test]
    fn test_source_root_must_be_directory() {
        let source = create_source_tree();
        let out = TempDir::new().unwrap();
        let policy = SnapshotPolicy::new(source.path().join("a.txt"), out.path());

        assert!(matches!(
            snapshot(&policy),
            Err(SnapshotError::SourceNotADirectory { .. })
        ));
    }

    #[test]
    fn test_missing_source_root_is_fatal() {
        let out = TempDir::new().unwrap();
        let policy = SnapshotPolicy::new("/nonexistent/cfsnap/source", out.path());
        assert!(matches!(
            snapshot(&policy),
            Err(SnapshotError::SourceRoot { .. })
        ));
    }

    #[test]
    fn test_output_root_is_created() {
        let source = create_source_tree();
        let out = TempDir::new().unwrap();
        let nested = out.path().join("deep/nested/catalog");
        let policy = SnapshotPolicy::new(source.path(), &nested);

        snapshot(&policy).unwrap();
        assert!(nested.join("a.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_copied_not_read() {
        let source = create_source_tree();
        std::os::unix::fs::symlink("a.txt", source.path().join("link")).unwrap();
        let out = TempDir::new().unwrap();
        let policy = SnapshotPolicy::new(source.path(), out.path());

        let report = snapshot(&policy).unwrap();

        assert_eq!(report.symlinks_copied, 1);
        let copied = out.path().join("link");
        assert!(fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&copied).unwrap(), PathBuf::from("a.txt"));
    }

    #[test]
    fn test_failed_hash_is_one_error_rest_complete() {
        use crate::digest::{ContentHasher, Sha256Hasher};
        use std::io::Read;

        // Fails exactly for one file's content, as if the medium died
        // mid-read for that file only.
        struct Sabotage;
        impl ContentHasher for Sabotage {
            fn hash_stream(&self, reader: &mut dyn Read) -> std::io::Result<String> {
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                if data == b"doomed" {
                    return Err(std::io::Error::other("device disconnected"));
                }
                Sha256Hasher.hash_stream(&mut &data[..])
            }
        }

        let source = create_source_tree();
        fs::write(source.path().join("flaky.bin"), "doomed").unwrap();

        let out = TempDir::new().unwrap();
        let mut policy = SnapshotPolicy::new(source.path(), out.path());
        policy.compute_hash = true;

        let report = Snapshotter::with_hasher(Arc::new(Sabotage))
            .snapshot(&policy)
            .unwrap();

        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::StreamRead);
        assert_eq!(report.files_written, 2);
        assert!(!out.path().join("flaky.bin").exists());
        assert!(out.path().join("a.txt").is_file());
        assert!(out.path().join("sub/b.txt").is_file());
    }

    #[test]
    fn test_entry_changed_or_vanished_is_entry_read() {
        let source = create_source_tree();
        let out = TempDir::new().unwrap();
        let policy = SnapshotPolicy::new(source.path(), out.path());
        let engine = Snapshotter::new();
        let resume = ResumeTracker::new(false);

        // The walk saw a regular file, but by processing time the path
        // holds a directory.
        let task = FileTask {
            source: source.path().join("sub"),
            output: out.path().join("sub"),
        };
        let warning = match engine.process_file(&task, &policy, &resume) {
            Err(warning) => warning,
            Ok(_) => panic!("directory must not produce a record"),
        };
        assert_eq!(warning.kind, WarningKind::EntryRead);

        // Or nothing at all.
        let task = FileTask {
            source: source.path().join("gone.txt"),
            output: out.path().join("gone.txt"),
        };
        let warning = match engine.process_file(&task, &policy, &resume) {
            Err(warning) => warning,
            Ok(_) => panic!("missing entry must not produce a record"),
        };
        assert_eq!(warning.kind, WarningKind::EntryRead);

        assert!(!out.path().join("sub").exists());
        assert!(!out.path().join("gone.txt").exists());
    }
}
