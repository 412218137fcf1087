//! cfsnap - make CatalogFS-compatible metadata snapshots of directory trees.
//!
//! Usage:
//!   cfsnap SOURCE_DIR OUTPUT_DIR            Full-stats snapshot
//!   cfsnap -s SOURCE_DIR OUTPUT_DIR         Snapshot with SHA-256 digests
//!   cfsnap -c SOURCE_DIR OUTPUT_DIR         Continue an interrupted snapshot
//!   cfsnap -x OLD_CATALOG NEW_CATALOG       Re-catalog an existing catalog
//!   cfsnap --help                           Show help

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use humansize::{DECIMAL, format_size};

use cfsnap_core::{CaptureMode, SnapshotPolicy};
use cfsnap_index::Snapshotter;

#[derive(Parser)]
#[command(
    name = "cfsnap",
    version,
    about = "Make a CatalogFS-compatible index (snapshot) of a directory tree",
    long_about = "cfsnap records the full file hierarchy of a source directory with all\n\
                  metadata (names, sizes, times, optional SHA-256 hashes) but none of the\n\
                  actual content, so a snapshot of terabytes takes almost no space.\n\n\
                  NOTE: this is not a backup tool; no file data is stored."
)]
struct Cli {
    /// Source directory to make an index of
    source_dir: PathBuf,

    /// Output directory (preferably empty) for the index files
    output_dir: PathBuf,

    /// Calculate and store SHA-256 hashes (much slower)
    #[arg(short = 's', long = "sha256", conflicts_with = "source_is_cfsfiles")]
    sha256: bool,

    /// Continue indexing: skip output entries that are already complete
    #[arg(short = 'c', long = "continue")]
    resume: bool,

    /// Store only the fields needed to compare content (size, hash);
    /// without --sha256 this degrades to size-only comparison
    #[arg(short = 'd', long, conflicts_with = "data_and_time_only")]
    data_only: bool,

    /// Store only the fields needed to compare content and modification time
    #[arg(short = 't', long)]
    data_and_time_only: bool,

    /// The source directory already contains CatalogFS records; re-derive
    /// from their content without touching original data
    #[arg(short = 'x', long = "source-is-cfsfiles")]
    source_is_cfsfiles: bool,

    /// Worker threads for per-file work (0 = auto)
    #[arg(long, default_value = "0")]
    threads: usize,

    /// Print the final report as JSON instead of the human summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let capture = if cli.data_only {
        CaptureMode::DataOnly
    } else if cli.data_and_time_only {
        CaptureMode::DataAndTime
    } else {
        CaptureMode::Full
    };

    let policy = SnapshotPolicy::builder()
        .source_root(cli.source_dir)
        .output_root(cli.output_dir)
        .capture(capture)
        .compute_hash(cli.sha256)
        .resume(cli.resume)
        .source_is_catalog(cli.source_is_cfsfiles)
        .threads(cli.threads)
        .build()
        .map_err(|e| eyre!(e))?;

    if !cli.json {
        eprintln!("Indexing {}...", policy.source_root.display());
    }

    let report = Snapshotter::new().snapshot(&policy)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(if report.is_clean() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} record(s) written, {} skipped, {} director(ies)",
        report.files_written, report.files_skipped, report.dirs_created
    );
    if report.symlinks_copied > 0 {
        println!(" {} symlink(s) copied", report.symlinks_copied);
    }
    if report.bytes_hashed > 0 {
        println!(" {} hashed", format_size(report.bytes_hashed, DECIMAL));
    }
    println!(" Finished in {:.2}s", report.duration.as_secs_f64());
    println!("{}", "─".repeat(60));

    if !report.is_clean() {
        println!();
        println!("{} entr(ies) failed:", report.error_count());
        for warning in &report.warnings {
            eprintln!("  {}: {}", warning.path.display(), warning.message);
        }
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
