//! Job orchestration module.
//!
//! This module drives one sampling job end to end:
//! - Planning: scanning the source directories, filtering and selecting
//! - Running: copying the selection and writing the selection log
//!
//! A dry run stops after planning and reports what would be copied. When an
//! unfinished run left a resume state behind, planning continues its
//! selection instead of drawing a new one.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SamplerConfig;
use crate::copy::{CancelToken, CopyEngine, CopyOptions, CopyOutcome};
use crate::error::{EngineError, Result};
use crate::inventory;
use crate::model::{DirectoryInventory, MediaEntry, MediaType, SelectionBudget, SelectionStats};
use crate::progress::ProgressCallback;
use crate::resume::{CheckpointPolicy, ResumeState};
use crate::selector;
use crate::undo::SelectionLog;

/// Number of entries listed in a dry-run report.
pub const DRY_RUN_SAMPLE_SIZE: usize = 10;

/// What a dry run would copy.
#[derive(Debug, Clone, PartialEq)]
pub struct DryRunReport {
    pub count: usize,
    pub total_size: u64,
    pub types: BTreeMap<String, usize>,
    pub media_types: BTreeMap<MediaType, usize>,

    /// The first few selected entries
    pub sample: Vec<MediaEntry>,

    /// Selected entries not listed in `sample`
    pub remaining: usize,
}

impl DryRunReport {
    pub fn from_selection(selection: &[MediaEntry]) -> Self {
        let stats = SelectionStats::from_entries(selection);
        let mut media_types = BTreeMap::new();
        for entry in selection {
            *media_types.entry(entry.media_type).or_insert(0) += 1;
        }
        let sample: Vec<MediaEntry> = selection.iter().take(DRY_RUN_SAMPLE_SIZE).cloned().collect();
        DryRunReport {
            count: stats.count,
            total_size: stats.total_size,
            types: stats.types,
            media_types,
            remaining: selection.len() - sample.len(),
            sample,
        }
    }
}

/// Result of a job that copied files.
#[derive(Debug, Clone)]
pub struct CopyReport {
    pub operation_id: Uuid,
    pub stats: SelectionStats,
    pub outcome: CopyOutcome,

    /// Where the selection log was written; None if the run was cancelled or
    /// the log could not be written
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The source directories hold no matching media files
    NoMediaFound,
    /// Media was found but the budget selected none of it
    NothingSelected,
    DryRun(DryRunReport),
    Copied(CopyReport),
}

/// Entries chosen by planning, and how many were available to choose from.
#[derive(Debug, Clone)]
pub struct SelectionPlan {
    pub available: usize,
    pub selection: Vec<MediaEntry>,
}

/// Scan, filter and select according to `config`.
///
/// Reports per-directory statistics and the selection through `progress`.
/// Unreadable source directories contribute nothing and are logged. If the
/// resume state of an unfinished run lists its selection, the entries of that
/// selection still available are chosen again.
pub fn plan_selection(
    config: &SamplerConfig,
    progress: Option<&dyn ProgressCallback>,
) -> SelectionPlan {
    let inventory = inventory::scan_directories(&config.source_dirs, config.filter.as_ref(), config.use_cache);
    for (dir, entries) in inventory.iter() {
        let stats = SelectionStats::from_entries(entries);
        info!(dir = %dir.display(), files = stats.count, bytes = stats.total_size, "Source directory ready");
        if let Some(callback) = progress {
            callback.on_directory_scanned(dir, &stats);
        }
    }

    let selection = match unfinished_selection(config, &inventory) {
        Some(selection) => selection,
        None => draw_selection(config, &inventory),
    };

    let stats = SelectionStats::from_entries(&selection);
    info!(
        budget = %config.budget,
        balanced = config.balanced,
        selected = stats.count,
        bytes = stats.total_size,
        "Selection made"
    );
    if let Some(callback) = progress {
        callback.on_selection_made(&stats);
    }
    SelectionPlan {
        available: inventory.total_files(),
        selection,
    }
}

fn draw_selection(config: &SamplerConfig, inventory: &DirectoryInventory) -> Vec<MediaEntry> {
    if let SelectionBudget::ByCount(n) = config.budget {
        if n > inventory.total_files() {
            warn!(
                requested = n,
                available = inventory.total_files(),
                "Fewer media files than requested, selecting all of them"
            );
        }
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    selector::select(inventory, config.budget, config.balanced, &mut rng)
}

/// The selection recorded by an unfinished run, limited to entries still in
/// `inventory`. None if there is no such run or none of its entries remain.
fn unfinished_selection(config: &SamplerConfig, inventory: &DirectoryInventory) -> Option<Vec<MediaEntry>> {
    let path = config.resolved_resume_path();
    let recorded = match ResumeState::load(&path) {
        Ok(Some(state)) if !state.selected_files.is_empty() => state.selected_files,
        Ok(_) => return None,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable resume state");
            return None;
        }
    };

    let available: HashMap<&Path, &MediaEntry> = inventory
        .iter()
        .flat_map(|(_, entries)| entries.iter())
        .map(|entry| (entry.path.as_path(), entry))
        .collect();
    let selection: Vec<MediaEntry> = recorded
        .iter()
        .filter_map(|source| available.get(source.as_path()).map(|entry| (*entry).clone()))
        .collect();

    if selection.len() < recorded.len() {
        warn!(
            recorded = recorded.len(),
            available = selection.len(),
            "Some files of the unfinished selection are no longer available"
        );
    }
    if selection.is_empty() {
        return None;
    }
    info!(
        path = %path.display(),
        files = selection.len(),
        "Continuing the selection of an unfinished run"
    );
    Some(selection)
}

/// Run a sampling job.
///
/// Individual scan and copy failures are recorded, not returned; see
/// `CopyOutcome::errors`. Unless the copy was cancelled, a selection log
/// listing every destination is written so the run can be undone.
///
/// # Errors
/// Returns EngineError for an invalid configuration or an unusable
/// destination directory.
pub fn run_job(
    config: &SamplerConfig,
    progress: Option<&dyn ProgressCallback>,
    cancel: Option<&CancelToken>,
) -> Result<JobOutcome> {
    config.validate()?;

    if !config.dry_run {
        fs::create_dir_all(&config.destination_dir).map_err(|e| EngineError::DestinationUnavailable {
            path: config.destination_dir.clone(),
            source: e,
        })?;
    }

    let SelectionPlan { available, selection } = plan_selection(config, progress);
    if available == 0 {
        return Ok(JobOutcome::NoMediaFound);
    }
    if selection.is_empty() {
        return Ok(JobOutcome::NothingSelected);
    }

    if config.dry_run {
        return Ok(JobOutcome::DryRun(DryRunReport::from_selection(&selection)));
    }

    let stats = SelectionStats::from_entries(&selection);
    let operation_id = Uuid::new_v4();
    let options = CopyOptions {
        destination_root: config.destination_dir.clone(),
        preserve_structure: config.preserve_structure,
        worker_count: config.worker_count,
        resume_path: Some(config.resolved_resume_path()),
        checkpoint: CheckpointPolicy::every(config.checkpoint_interval),
        verify: config.verify,
    };
    let outcome = CopyEngine::new(options).run(&selection, progress, cancel)?;

    let log_path = if outcome.cancelled {
        info!("Copy cancelled, selection log not written");
        None
    } else {
        let log = SelectionLog {
            operation_id,
            timestamp: Utc::now(),
            destination: config.destination_dir.clone(),
            total_selected: selection.len(),
            files: outcome.destination_paths.clone(),
            stats: stats.clone(),
            filters_applied: config.filter.clone(),
        };
        match log.save() {
            Ok(path) => {
                info!(path = %path.display(), %operation_id, "Selection log written");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "Selection log not written, this run cannot be undone");
                None
            }
        }
    };

    Ok(JobOutcome::Copied(CopyReport {
        operation_id,
        stats,
        outcome,
        log_path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SelectionFilter;
    use crate::resume::{ResumeState, COPY_OPERATION, RESUME_FILE_NAME};
    use crate::undo::{self, UndoOutcome, SELECTION_LOG_FILE_NAME};
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::Mutex;

    fn write(path: &Path, bytes: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent dir");
        fs::write(path, bytes).expect("Failed to write file");
    }

    /// Two source folders, 6 and 4 images, plus a non-media file.
    fn source_tree(root: &Path) -> (PathBuf, PathBuf) {
        let a = root.join("src/a");
        let b = root.join("src/b");
        for i in 0..6 {
            write(&a.join(format!("a{}.jpg", i)), &vec![b'a'; 100 + i]);
        }
        for i in 0..4 {
            write(&b.join(format!("sub/b{}.png", i)), &vec![b'b'; 200 + i]);
        }
        write(&a.join("notes.txt"), b"not media");
        (a, b)
    }

    fn config(root: &Path, budget: SelectionBudget) -> SamplerConfig {
        let (a, b) = source_tree(root);
        let mut config = SamplerConfig::new(vec![a, b], root.join("dst"), budget);
        config.seed = Some(7);
        config.use_cache = false;
        config
    }

    fn names_in(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .expect("Failed to read dir")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[derive(Default)]
    struct Recorder {
        scanned: Mutex<Vec<(PathBuf, usize)>>,
        selected: Mutex<Option<usize>>,
    }

    impl ProgressCallback for Recorder {
        fn on_directory_scanned(&self, dir: &Path, stats: &SelectionStats) {
            self.scanned.lock().unwrap().push((dir.to_path_buf(), stats.count));
        }

        fn on_selection_made(&self, stats: &SelectionStats) {
            *self.selected.lock().unwrap() = Some(stats.count);
        }
    }

    fn copied(outcome: JobOutcome) -> CopyReport {
        match outcome {
            JobOutcome::Copied(report) => report,
            other => panic!("Expected a copy, got {:?}", other),
        }
    }

    #[test]
    fn test_run_job_copies_and_logs_selection() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = config(temp_dir.path(), SelectionBudget::ByCount(5));
        let recorder = Recorder::default();

        let report = copied(run_job(&config, Some(&recorder), None).expect("Job failed"));

        assert_eq!(report.stats.count, 5);
        assert!(report.outcome.is_complete());
        assert_eq!(report.outcome.destination_paths.len(), 5);
        assert_eq!(*recorder.selected.lock().unwrap(), Some(5));
        assert_eq!(
            *recorder.scanned.lock().unwrap(),
            vec![(config.source_dirs[0].clone(), 6), (config.source_dirs[1].clone(), 4)]
        );

        let log = SelectionLog::load(&config.destination_dir)
            .expect("Failed to load log")
            .expect("Log missing");
        assert_eq!(log.operation_id, report.operation_id);
        assert_eq!(log.files, report.outcome.destination_paths);
        assert_eq!(log.total_selected, 5);
        assert_eq!(report.log_path, Some(config.destination_dir.join(SELECTION_LOG_FILE_NAME)));
        assert!(!config.destination_dir.join(RESUME_FILE_NAME).exists());
    }

    #[test]
    fn test_same_seed_selects_same_files() {
        let first_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let second_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let names = |dir: &Path| {
            let report = copied(run_job(&config(dir, SelectionBudget::ByCount(4)), None, None).expect("Job failed"));
            report
                .outcome
                .destination_paths
                .iter()
                .map(|p| p.file_name().unwrap().to_owned())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(first_dir.path()), names(second_dir.path()));
    }

    #[test]
    fn test_balanced_count_spreads_across_sources() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = config(temp_dir.path(), SelectionBudget::ByCount(4));
        config.balanced = true;
        config.preserve_structure = true;

        copied(run_job(&config, None, None).expect("Job failed"));
        assert_eq!(names_in(&config.destination_dir.join("a")).len(), 2);
        assert_eq!(names_in(&config.destination_dir.join("sub")).len(), 2);
    }

    #[test]
    fn test_filter_restricts_selection() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = config(temp_dir.path(), SelectionBudget::ByCount(100));
        config.filter = Some(SelectionFilter::new().with_extensions(["png"]));

        let report = copied(run_job(&config, None, None).expect("Job failed"));
        assert_eq!(report.stats.count, 4);
        assert_eq!(report.stats.types.get("png"), Some(&4));

        let log = SelectionLog::load(&config.destination_dir).unwrap().unwrap();
        assert_eq!(log.filters_applied, config.filter);
    }

    #[test]
    fn test_size_budget_stays_under_target() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = config(temp_dir.path(), SelectionBudget::BySize(650));

        let report = copied(run_job(&config, None, None).expect("Job failed"));
        assert!(report.stats.total_size <= 650);
        assert_eq!(report.outcome.bytes_copied, report.stats.total_size);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = config(temp_dir.path(), SelectionBudget::ByCount(100));
        config.dry_run = true;

        let report = match run_job(&config, None, None).expect("Job failed") {
            JobOutcome::DryRun(report) => report,
            other => panic!("Expected a dry run, got {:?}", other),
        };

        assert_eq!(report.count, 10);
        assert_eq!(report.total_size, (100..106).sum::<u64>() + (200..204).sum::<u64>());
        assert_eq!(report.types.get("jpg"), Some(&6));
        assert_eq!(report.media_types.get(&MediaType::Image), Some(&10));
        assert_eq!(report.sample.len(), DRY_RUN_SAMPLE_SIZE);
        assert_eq!(report.remaining, 0);
        assert!(!config.destination_dir.exists());
    }

    #[test]
    fn test_dry_run_report_truncates_sample() {
        let entries: Vec<MediaEntry> = (0..13)
            .map(|i| crate::model::tests::entry(&format!("/src/{}.mp4", i), 10))
            .collect();
        let report = DryRunReport::from_selection(&entries);
        assert_eq!(report.sample.len(), 10);
        assert_eq!(report.remaining, 3);
        assert_eq!(report.media_types.get(&MediaType::Video), Some(&13));
    }

    #[test]
    fn test_no_media_found() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let empty = temp_dir.path().join("empty");
        write(&empty.join("readme.txt"), b"text");
        let config = SamplerConfig::new(vec![empty], temp_dir.path().join("dst"), SelectionBudget::ByCount(5));

        assert!(matches!(run_job(&config, None, None).expect("Job failed"), JobOutcome::NoMediaFound));
    }

    #[test]
    fn test_budget_selecting_nothing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = config(temp_dir.path(), SelectionBudget::BySize(10));

        assert!(matches!(run_job(&config, None, None).expect("Job failed"), JobOutcome::NothingSelected));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = config(temp_dir.path(), SelectionBudget::ByCount(5));
        config.worker_count = 0;

        let err = run_job(&config, None, None).unwrap_err();
        assert!(err.is_fatal());
        assert!(!config.destination_dir.exists());
    }

    #[test]
    fn test_undo_removes_copied_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = config(temp_dir.path(), SelectionBudget::ByCount(5));
        let dst = config.destination_dir.clone();
        write(&dst.join("keep.jpg"), b"already here");

        copied(run_job(&config, None, None).expect("Job failed"));
        assert_eq!(names_in(&dst).len(), 7);

        match undo::undo(&dst).expect("Undo failed") {
            UndoOutcome::Completed(summary) => {
                assert_eq!(summary.deleted, 5);
                assert!(summary.failures.is_empty());
            }
            UndoOutcome::NothingToUndo => panic!("Expected files to undo"),
        }
        assert_eq!(names_in(&dst), ["keep.jpg".to_string()].into_iter().collect::<BTreeSet<_>>());
        assert_eq!(undo::undo(&dst).expect("Second undo failed"), UndoOutcome::NothingToUndo);
    }

    #[test]
    fn test_resume_after_interruption_logs_every_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = config(temp_dir.path(), SelectionBudget::ByCount(10));
        let dst = config.destination_dir.clone();

        // Produce the full selection once, then roll the destination back to
        // a run that stopped after checkpointing half of its files.
        let full = copied(run_job(&config, None, None).expect("Job failed"));
        let all_paths = full.outcome.destination_paths.clone();
        fs::remove_file(dst.join(SELECTION_LOG_FILE_NAME)).expect("Failed to remove log");
        let (kept, lost) = all_paths.split_at(5);
        for path in lost {
            fs::remove_file(path).expect("Failed to remove copy");
        }
        ResumeState {
            operation: COPY_OPERATION.to_string(),
            total_files: 10,
            selected_files: Vec::new(),
            copied_files: kept.to_vec(),
            copied_from: Default::default(),
            timestamp: Utc::now(),
        }
        .save(&dst.join(RESUME_FILE_NAME))
        .expect("Failed to save resume state");

        let resumed = copied(run_job(&config, None, None).expect("Resume failed"));
        assert_eq!(resumed.outcome.already_present, 5);
        assert_eq!(resumed.outcome.newly_copied, 5);

        let log = SelectionLog::load(&dst).unwrap().expect("Log missing");
        assert_eq!(log.files.len(), 10);
        let logged: BTreeSet<&PathBuf> = log.files.iter().collect();
        let expected: BTreeSet<&PathBuf> = all_paths.iter().collect();
        assert_eq!(logged, expected);
        assert!(!dst.join(RESUME_FILE_NAME).exists());
    }

    #[test]
    fn test_cancelled_job_writes_no_log() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = config(temp_dir.path(), SelectionBudget::ByCount(5));
        let token = CancelToken::new();
        token.cancel();

        let report = copied(run_job(&config, None, Some(&token)).expect("Job failed"));
        assert!(report.outcome.cancelled);
        assert!(report.log_path.is_none());
        assert!(!config.destination_dir.join(SELECTION_LOG_FILE_NAME).exists());
        assert!(config.destination_dir.join(RESUME_FILE_NAME).exists());
    }

    struct CancelOnStart {
        token: CancelToken,
    }

    impl ProgressCallback for CancelOnStart {
        fn on_copy_started(&self, _total: usize, _already_done: usize) {
            self.token.cancel();
        }
    }

    fn twenty_files(root: &Path) -> SamplerConfig {
        let src = root.join("src");
        for i in 0..20 {
            write(&src.join(format!("f{:02}.jpg", i)), format!("file {}", i).as_bytes());
        }
        let mut config = SamplerConfig::new(vec![src], root.join("dst"), SelectionBudget::ByCount(6));
        config.use_cache = false;
        config
    }

    fn media_in(dir: &Path) -> BTreeSet<PathBuf> {
        fs::read_dir(dir)
            .expect("Failed to read dir")
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "jpg"))
            .collect()
    }

    fn file_names<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> BTreeSet<String> {
        paths
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_unseeded_rerun_keeps_cancelled_selection() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = twenty_files(temp_dir.path());
        let dst = config.destination_dir.clone();

        let canceller = CancelOnStart {
            token: CancelToken::new(),
        };
        let first = copied(run_job(&config, Some(&canceller), Some(&canceller.token)).expect("First run failed"));
        assert!(first.outcome.cancelled);
        assert!(media_in(&dst).is_empty());
        let state = ResumeState::load(&dst.join(RESUME_FILE_NAME))
            .expect("Failed to load resume state")
            .expect("Resume state missing");
        assert_eq!(state.selected_files.len(), 6);

        let second = copied(run_job(&config, None, None).expect("Rerun failed"));
        assert!(second.outcome.is_complete());
        assert_eq!(second.outcome.newly_copied, 6);
        assert_eq!(file_names(&second.outcome.destination_paths), file_names(&state.selected_files));
    }

    #[test]
    fn test_unseeded_rerun_completes_interrupted_selection() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = twenty_files(temp_dir.path());
        let src = config.source_dirs[0].clone();
        let dst = config.destination_dir.clone();

        // Roll a finished run back to one interrupted after three copies.
        let full = copied(run_job(&config, None, None).expect("Job failed"));
        let selected = full.outcome.destination_paths.clone();
        fs::remove_file(dst.join(SELECTION_LOG_FILE_NAME)).expect("Failed to remove log");
        let (kept, lost) = selected.split_at(3);
        for path in lost {
            fs::remove_file(path).expect("Failed to remove copy");
        }
        let source_of = |dest: &PathBuf| src.join(dest.file_name().unwrap());
        ResumeState {
            operation: COPY_OPERATION.to_string(),
            total_files: 6,
            selected_files: selected.iter().map(source_of).collect(),
            copied_files: kept.to_vec(),
            copied_from: kept.iter().map(|dest| (dest.clone(), source_of(dest))).collect(),
            timestamp: Utc::now(),
        }
        .save(&dst.join(RESUME_FILE_NAME))
        .expect("Failed to save resume state");

        let resumed = copied(run_job(&config, None, None).expect("Rerun failed"));
        assert!(resumed.outcome.is_complete());
        assert_eq!(resumed.outcome.already_present, 3);
        assert_eq!(resumed.outcome.newly_copied, 3);

        let log = SelectionLog::load(&dst).unwrap().expect("Log missing");
        let logged: BTreeSet<PathBuf> = log.files.iter().cloned().collect();
        assert_eq!(log.files.len(), 6);
        assert_eq!(logged, selected.iter().cloned().collect::<BTreeSet<_>>());
        assert_eq!(media_in(&dst), logged);

        match undo::undo(&dst).expect("Undo failed") {
            UndoOutcome::Completed(summary) => assert_eq!(summary.deleted, 6),
            UndoOutcome::NothingToUndo => panic!("Expected files to undo"),
        }
        assert!(media_in(&dst).is_empty());
    }
}
