//! Media Sampler - Command-line interface for the sampling engine.
//!
//! Copies a random sample of photos and videos from one or more folders into a
//! destination folder, or undoes an earlier run. Progress goes to stderr.

use chrono::NaiveDate;
use clap::Parser;
use sampler_engine::{
    parse_size, run_job, undo, CancelToken, ChecksumAlgorithm, CopyEvent, CopyOutcome, CopyReport, DryRunReport,
    JobOutcome, MediaType, ProgressCallback, SamplerConfig, SelectionBudget, SelectionFilter,
    SelectionStats, UndoOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Number of copy errors listed in the final summary.
const MAX_LISTED_ERRORS: usize = 5;

/// Media Sampler - copy a random sample of media files
#[derive(Parser, Debug)]
#[command(name = "media-sampler")]
#[command(version = "0.1.0")]
#[command(about = "Copy a random sample of photos and videos into one folder")]
struct Args {
    /// Comma-separated source folders
    #[arg(short = 's', long, value_name = "DIRS")]
    source_folders: Option<String>,

    /// Destination folder
    #[arg(long, value_name = "PATH")]
    destination: Option<PathBuf>,

    /// Number of files to select
    #[arg(short = 'n', long, value_name = "COUNT", default_value_t = 100)]
    num_files: usize,

    /// Total size to select instead of a count, e.g. 500MB or 1.5GB
    #[arg(long, value_name = "SIZE")]
    target_size: Option<String>,

    /// Spread the selection evenly across source folders
    #[arg(short = 'b', long)]
    balanced: bool,

    /// Show what would be copied without copying
    #[arg(short = 'd', long)]
    dry_run: bool,

    /// Copy into subfolders named after each file's parent folder
    #[arg(short = 'p', long)]
    preserve_structure: bool,

    /// Minimum file size, e.g. 100KB
    #[arg(long, value_name = "SIZE")]
    min_size: Option<String>,

    /// Maximum file size, e.g. 2GB
    #[arg(long, value_name = "SIZE")]
    max_size: Option<String>,

    /// Earliest modification date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    date_from: Option<String>,

    /// Latest modification date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    date_to: Option<String>,

    /// Comma-separated extensions to keep, e.g. jpg,png
    #[arg(long, value_name = "EXTS")]
    file_types: Option<String>,

    /// Comma-separated media types to keep: image, video
    #[arg(long, value_name = "TYPES")]
    media_types: Option<String>,

    /// Number of parallel copy workers
    #[arg(long, value_name = "N", default_value_t = 4)]
    max_workers: usize,

    /// Ignore and do not write the per-folder scan cache
    #[arg(long)]
    no_cache: bool,

    /// Resume state file (default: <destination>/operation_resume.json)
    #[arg(long, value_name = "PATH")]
    resume_file: Option<PathBuf>,

    /// Delete the files copied by the last run into --destination
    #[arg(long)]
    undo: bool,

    /// Seed for a reproducible selection
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Verify each copy with a checksum: sha256 or blake3
    #[arg(long, value_name = "ALGORITHM")]
    verify: Option<String>,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,
}

/// CLI implementation of ProgressCallback for displaying sampling progress
struct CliProgress {
    verbose: bool,
    start_time: Instant,
    last_progress_update: Mutex<Option<Instant>>,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
            last_progress_update: Mutex::new(None),
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn print_progress_bar(percent: u32) -> String {
        let filled = (percent.min(100) / 5) as usize;
        let empty = 20 - filled;
        format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(empty), percent)
    }

    fn format_types(types: &std::collections::BTreeMap<String, usize>) -> String {
        types
            .iter()
            .map(|(ext, count)| format!("{}: {}", ext, count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Throttle progress updates to at most one per 200ms, always letting the last one through.
    fn should_redraw(&self, completed: usize, total: usize) -> bool {
        let Ok(mut last) = self.last_progress_update.lock() else {
            return true;
        };
        let due = completed == total || last.map_or(true, |t| t.elapsed().as_millis() >= 200);
        if due {
            *last = Some(Instant::now());
        }
        due
    }
}

impl ProgressCallback for CliProgress {
    fn on_directory_scanned(&self, dir: &Path, stats: &SelectionStats) {
        eprintln!(
            "  {}: {} files, {}",
            dir.display(),
            stats.count,
            Self::format_bytes(stats.total_size)
        );
        if self.verbose && !stats.types.is_empty() {
            eprintln!("    {}", Self::format_types(&stats.types));
        }
    }

    fn on_selection_made(&self, stats: &SelectionStats) {
        eprintln!(
            "Selected {} files ({})",
            stats.count,
            Self::format_bytes(stats.total_size)
        );
    }

    fn on_copy_started(&self, total: usize, already_done: usize) {
        if already_done > 0 {
            eprintln!(
                "Copying {} files ({} already present from an earlier run)...",
                total - already_done,
                already_done
            );
        } else {
            eprintln!("Copying {} files...", total);
        }
    }

    fn on_file_completed(&self, completed: usize, total: usize, event: &CopyEvent) {
        if self.verbose {
            match event {
                CopyEvent::Copied { source, destination, .. } => {
                    eprintln!("[{:3}] Done: {} -> {}", completed, source.display(), destination.display())
                }
                CopyEvent::Failed(failure) => eprintln!("[{:3}] Failed: {}", completed, failure),
                CopyEvent::Skipped { source } => {
                    eprintln!("[{:3}] Cancelled: {}", completed, source.display())
                }
            }
            return;
        }

        if !self.should_redraw(completed, total) {
            return;
        }
        let percent = (completed as f64 / total.max(1) as f64 * 100.0) as u32;
        eprint!(
            "\rProgress: {} | {}/{} files",
            Self::print_progress_bar(percent),
            completed,
            total
        );
        let _ = std::io::Write::flush(&mut std::io::stderr());
    }

    fn on_copy_completed(&self, _outcome: &CopyOutcome) {
        if !self.verbose {
            eprintln!();
        }
    }
}

/// Parse and validate command-line arguments, then run the job
fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);
    let cancel = install_interrupt_handler();

    // Exit code tracking
    let exit_code = match run_cli(&args, Some(&cancel)) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Log to stderr; RUST_LOG overrides the level chosen by --verbose.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// The first Ctrl-C stops new copies and lets the job save its resume state;
/// a second one exits immediately.
fn install_interrupt_handler() -> CancelToken {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    let installed = ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            std::process::exit(130);
        }
        eprintln!("\nInterrupted, finishing copies in progress (Ctrl-C again to quit)...");
        handler_token.cancel();
    });
    if let Err(e) = installed {
        warn!(error = %e, "Ctrl-C handler not installed");
    }
    cancel
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args, cancel: Option<&CancelToken>) -> Result<(), String> {
    if args.undo {
        let destination = args
            .destination
            .as_ref()
            .ok_or("--undo requires --destination")?;
        return run_undo(destination);
    }

    let config = build_config(args)?;
    let progress = CliProgress::new(args.verbose);

    eprintln!("Scanning {} source folder(s)...", config.source_dirs.len());
    let outcome = run_job(&config, Some(&progress), cancel).map_err(|e| format!("Sampling failed: {}", e))?;

    match outcome {
        JobOutcome::NoMediaFound => {
            eprintln!("No media files found in the source folders.");
            Ok(())
        }
        JobOutcome::NothingSelected => {
            eprintln!("No files fit the requested selection.");
            Ok(())
        }
        JobOutcome::DryRun(report) => {
            print_dry_run(&report);
            Ok(())
        }
        JobOutcome::Copied(report) => {
            print_summary(&report, &config, progress.start_time.elapsed());
            if report.outcome.errors.is_empty() {
                Ok(())
            } else {
                Err(format!("{} file(s) failed to copy", report.outcome.errors.len()))
            }
        }
    }
}

fn run_undo(destination: &Path) -> Result<(), String> {
    match undo(destination).map_err(|e| format!("Undo failed: {}", e))? {
        UndoOutcome::NothingToUndo => {
            eprintln!("Nothing to undo in {}", destination.display());
            Ok(())
        }
        UndoOutcome::Completed(summary) => {
            eprintln!(
                "Undo complete: {} deleted, {} already gone, {} failed",
                summary.deleted,
                summary.missing,
                summary.failures.len()
            );
            for failure in &summary.failures {
                eprintln!("  {}: {}", failure.path.display(), failure.message);
            }
            if summary.failures.is_empty() {
                Ok(())
            } else {
                Err(format!("{} file(s) could not be deleted", summary.failures.len()))
            }
        }
    }
}

/// Translate arguments into a job configuration.
///
/// Invalid source folders and unparsable filter values are warned about and
/// ignored; everything else that is invalid is an error.
fn build_config(args: &Args) -> Result<SamplerConfig, String> {
    let raw_sources = args
        .source_folders
        .as_deref()
        .ok_or("--source-folders is required")?;
    let destination = args.destination.clone().ok_or("--destination is required")?;

    let source_dirs: Vec<PathBuf> = split_list(raw_sources)
        .map(PathBuf::from)
        .filter(|dir| {
            let valid = dir.is_dir();
            if !valid {
                warn!(path = %dir.display(), "Source folder does not exist, skipping");
            }
            valid
        })
        .collect();
    if source_dirs.is_empty() {
        return Err("No valid source folders given".to_string());
    }

    let budget = match &args.target_size {
        Some(raw) => {
            let bytes = parse_size(raw).ok_or_else(|| format!("Invalid target size '{}'", raw))?;
            SelectionBudget::BySize(bytes)
        }
        None => SelectionBudget::ByCount(args.num_files),
    };

    let verify = match &args.verify {
        Some(raw) => Some(ChecksumAlgorithm::from_str(raw).ok_or_else(|| {
            format!("Invalid verify algorithm '{}'. Must be 'sha256' or 'blake3'", raw)
        })?),
        None => None,
    };

    let mut config = SamplerConfig::new(source_dirs, destination, budget);
    config.balanced = args.balanced;
    config.dry_run = args.dry_run;
    config.preserve_structure = args.preserve_structure;
    config.filter = build_filter(args);
    config.resume_path = args.resume_file.clone();
    config.worker_count = args.max_workers;
    config.use_cache = !args.no_cache;
    config.seed = args.seed;
    config.verify = verify;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn build_filter(args: &Args) -> Option<SelectionFilter> {
    let mut filter = SelectionFilter::new();

    if let Some(bytes) = args.min_size.as_deref().and_then(|raw| size_or_warn("--min-size", raw)) {
        filter = filter.with_min_size(bytes);
    }
    if let Some(bytes) = args.max_size.as_deref().and_then(|raw| size_or_warn("--max-size", raw)) {
        filter = filter.with_max_size(bytes);
    }
    if let Some(date) = args.date_from.as_deref().and_then(|raw| date_or_warn("--date-from", raw)) {
        filter = filter.with_date_from(date);
    }
    if let Some(date) = args.date_to.as_deref().and_then(|raw| date_or_warn("--date-to", raw)) {
        filter = filter.with_date_to(date);
    }
    if let Some(raw) = &args.file_types {
        filter = filter.with_extensions(split_list(raw));
    }
    if let Some(raw) = &args.media_types {
        let types: Vec<MediaType> = split_list(raw)
            .filter_map(|name| {
                let parsed = MediaType::from_str(name);
                if parsed.is_none() {
                    warn!(value = name, "Unknown media type, ignoring");
                }
                parsed
            })
            .collect();
        if !types.is_empty() {
            filter = filter.with_media_types(types);
        }
    }

    if filter.is_empty() {
        None
    } else {
        Some(filter)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn size_or_warn(flag: &str, raw: &str) -> Option<u64> {
    let parsed = parse_size(raw);
    if parsed.is_none() {
        warn!(flag, value = raw, "Invalid size, filter not applied");
    }
    parsed
}

fn date_or_warn(flag: &str, raw: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(e) => {
            warn!(flag, value = raw, error = %e, "Invalid date, filter not applied");
            None
        }
    }
}

fn print_dry_run(report: &DryRunReport) {
    eprintln!();
    eprintln!("Dry run: nothing was copied.");
    eprintln!(
        "Would copy {} files ({})",
        report.count,
        CliProgress::format_bytes(report.total_size)
    );
    if !report.types.is_empty() {
        eprintln!("By extension: {}", CliProgress::format_types(&report.types));
    }
    let media: Vec<String> = report
        .media_types
        .iter()
        .map(|(kind, count)| format!("{}: {}", kind, count))
        .collect();
    if !media.is_empty() {
        eprintln!("By media type: {}", media.join(", "));
    }
    eprintln!();
    eprintln!("Sample:");
    for entry in &report.sample {
        eprintln!(
            "  {} ({})",
            entry.path.display(),
            CliProgress::format_bytes(entry.size_bytes)
        );
    }
    if report.remaining > 0 {
        eprintln!("  ... and {} more", report.remaining);
    }
}

fn print_summary(report: &CopyReport, config: &SamplerConfig, elapsed: Duration) {
    let outcome = &report.outcome;
    eprintln!();
    if outcome.cancelled {
        eprintln!("Copy cancelled; rerun the same command to resume.");
    } else {
        eprintln!("Sampling complete!");
    }
    eprintln!(
        "Summary: {} of {} files in place ({} copied now, {} already present), {} failed",
        outcome.copied_count,
        report.stats.count,
        outcome.newly_copied,
        outcome.already_present,
        outcome.errors.len()
    );
    eprintln!("Bytes copied: {}", CliProgress::format_bytes(outcome.bytes_copied));
    eprintln!("Elapsed: {}", CliProgress::format_duration(elapsed));

    if !outcome.errors.is_empty() {
        eprintln!();
        eprintln!("Errors ({}):", outcome.errors.len());
        for failure in outcome.errors.iter().take(MAX_LISTED_ERRORS) {
            eprintln!("  {}", failure);
        }
        if outcome.errors.len() > MAX_LISTED_ERRORS {
            eprintln!("  ... and {} more", outcome.errors.len() - MAX_LISTED_ERRORS);
        }
        eprintln!(
            "Resume state kept at {}; rerun to retry the failed files.",
            config.resolved_resume_path().display()
        );
    }

    if let Some(log_path) = &report.log_path {
        eprintln!("Selection log: {}", log_path.display());
        eprintln!(
            "To revert: media-sampler --undo --destination {}",
            config.destination_dir.display()
        );
    }
}
