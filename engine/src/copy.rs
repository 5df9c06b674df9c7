//! Parallel, resumable copy of selected entries.
//!
//! The coordinating thread resolves destinations, adopts files already copied
//! by an earlier attempt, then hands the remaining files to a fixed-size
//! worker pool. Workers only copy; every result comes back over a channel to
//! the coordinator, which alone updates the ledger, writes checkpoints and
//! reports progress. Checkpoints therefore always see a complete view of what
//! has been copied so far.
//!
//! Staging files left in the destination by a process that was killed
//! mid-copy are removed before a run starts.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::checksums::ChecksumAlgorithm;
use crate::error::{EngineError, Result};
use crate::fs_ops::{self, CopiedFile, MAX_COLLISION_SUFFIX};
use crate::model::MediaEntry;
use crate::progress::ProgressCallback;
use crate::resume::{CheckpointPolicy, CopyLedger, ResumeState};

/// Default number of copy workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Settings for one copy operation.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Root directory receiving the copies
    pub destination_root: PathBuf,

    /// Copy into `<root>/<parent dir name>/` instead of `<root>/`
    pub preserve_structure: bool,

    pub worker_count: usize,

    /// Resume state location; None disables checkpoints and adoption of
    /// existing destination files
    pub resume_path: Option<PathBuf>,

    pub checkpoint: CheckpointPolicy,

    /// Compare checksums of source and copy before publishing
    pub verify: Option<ChecksumAlgorithm>,
}

impl CopyOptions {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        CopyOptions {
            destination_root: destination_root.into(),
            preserve_structure: false,
            worker_count: DEFAULT_WORKERS,
            resume_path: None,
            checkpoint: CheckpointPolicy::default(),
            verify: None,
        }
    }
}

/// Cooperative cancellation flag shared between a job and its caller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A file that could not be copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFailure {
    pub source_path: PathBuf,
    pub message: String,
}

impl fmt::Display for CopyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error copying {}: {}", self.source_path.display(), self.message)
    }
}

/// What happened to one pending file.
#[derive(Debug, Clone)]
pub enum CopyEvent {
    Copied {
        source: PathBuf,
        destination: PathBuf,
        bytes: u64,
    },
    Failed(CopyFailure),
    /// Not attempted because the operation was cancelled
    Skipped { source: PathBuf },
}

/// Result of a copy operation.
#[derive(Debug, Clone, Default)]
pub struct CopyOutcome {
    /// Entries that have a destination file, from this or an earlier attempt
    pub copied_count: usize,

    /// Entries copied by this attempt
    pub newly_copied: usize,

    /// Entries whose destination already existed from an earlier attempt
    pub already_present: usize,

    /// Bytes copied by this attempt
    pub bytes_copied: u64,

    /// Destination of every entry that has one, in selection order, followed
    /// by files an earlier attempt of the operation copied for entries that
    /// are no longer selected
    pub destination_paths: Vec<PathBuf>,

    pub errors: Vec<CopyFailure>,

    /// True if some files were not attempted because of cancellation
    pub cancelled: bool,
}

impl CopyOutcome {
    /// True when every entry has a destination and nothing failed.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.errors.is_empty()
    }
}

enum TaskResult {
    Copied(usize, CopiedFile),
    Failed(usize, EngineError),
    Skipped(usize),
}

/// Bounded worker pool copying entries into a destination root.
#[derive(Debug, Clone)]
pub struct CopyEngine {
    options: CopyOptions,
}

impl CopyEngine {
    pub fn new(options: CopyOptions) -> Self {
        CopyEngine { options }
    }

    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    /// Copy `entries` into the destination root.
    ///
    /// Per-file failures are collected in the outcome and never stop the
    /// other copies.
    ///
    /// # Errors
    /// Returns EngineError only if the destination root cannot be created or
    /// the worker pool cannot be started.
    pub fn run(
        &self,
        entries: &[MediaEntry],
        progress: Option<&dyn ProgressCallback>,
        cancel: Option<&CancelToken>,
    ) -> Result<CopyOutcome> {
        let root = &self.options.destination_root;
        fs::create_dir_all(root).map_err(|e| EngineError::DestinationUnavailable {
            path: root.clone(),
            source: e,
        })?;
        let stale = fs_ops::remove_stale_staging_files(root);
        if stale > 0 {
            info!(count = stale, "Removed staging files of an interrupted copy");
        }

        let resume_path = self.options.resume_path.as_deref();
        let prior = resume_path.and_then(|path| match ResumeState::load(path) {
            Ok(Some(state)) => {
                info!(
                    path = %path.display(),
                    copied = state.copied_files.len(),
                    "Resuming earlier operation"
                );
                Some(state)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable resume state");
                None
            }
        });
        let mut ledger = CopyLedger::from_state(prior);

        let mut destinations: Vec<Option<PathBuf>> = vec![None; entries.len()];
        let mut pending: Vec<(usize, PathBuf)> = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let preferred = fs_ops::destination_for(entry, root, self.options.preserve_structure);
            if resume_path.is_some() {
                if let Some(existing) = self.find_existing_copy(&ledger, entry, &preferred) {
                    debug!(
                        source = %entry.path.display(),
                        destination = %existing.display(),
                        "Already copied"
                    );
                    ledger.record(&entry.path, &existing);
                    destinations[index] = Some(existing);
                    continue;
                }
            }
            pending.push((index, preferred));
        }

        let mut outcome = CopyOutcome {
            already_present: entries.len() - pending.len(),
            ..CopyOutcome::default()
        };
        if let Some(callback) = progress {
            callback.on_copy_started(entries.len(), outcome.already_present);
        }
        info!(
            total = entries.len(),
            pending = pending.len(),
            already_present = outcome.already_present,
            workers = self.options.worker_count,
            "Copying files"
        );

        let mut skipped = 0usize;
        if !pending.is_empty() {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.worker_count.max(1))
                .thread_name(|i| format!("copy-worker-{}", i))
                .build()
                .map_err(|e| EngineError::Config(format!("cannot start copy workers: {}", e)))?;

            let total = pending.len();
            let verify = self.options.verify;
            let (tx, rx) = crossbeam_channel::unbounded::<TaskResult>();

            pool.in_place_scope(|scope| {
                for (index, preferred) in &pending {
                    let tx = tx.clone();
                    let entry = &entries[*index];
                    scope.spawn(move |_| {
                        let result = if cancel.is_some_and(CancelToken::is_cancelled) {
                            TaskResult::Skipped(*index)
                        } else {
                            match fs_ops::copy_to_unique_destination(&entry.path, preferred, verify) {
                                Ok(copied) => TaskResult::Copied(*index, copied),
                                Err(e) => TaskResult::Failed(*index, e),
                            }
                        };
                        let _ = tx.send(result);
                    });
                }
                drop(tx);

                let mut completed = 0usize;
                for result in rx.iter() {
                    completed += 1;
                    let event = match result {
                        TaskResult::Copied(index, copied) => {
                            let source = entries[index].path.clone();
                            ledger.record(&source, &copied.destination);
                            destinations[index] = Some(copied.destination.clone());
                            outcome.newly_copied += 1;
                            outcome.bytes_copied += copied.bytes;
                            CopyEvent::Copied {
                                source,
                                destination: copied.destination,
                                bytes: copied.bytes,
                            }
                        }
                        TaskResult::Failed(index, e) => {
                            warn!(error = %e, "Copy failed");
                            let failure = CopyFailure {
                                source_path: entries[index].path.clone(),
                                message: e.to_string(),
                            };
                            outcome.errors.push(failure.clone());
                            CopyEvent::Failed(failure)
                        }
                        TaskResult::Skipped(index) => {
                            skipped += 1;
                            CopyEvent::Skipped {
                                source: entries[index].path.clone(),
                            }
                        }
                    };
                    if let Some(callback) = progress {
                        callback.on_file_completed(completed, total, &event);
                    }

                    if let Some(path) = resume_path {
                        if self.options.checkpoint.should_checkpoint(completed, total) {
                            let state = ledger.snapshot(entries);
                            match state.save(path) {
                                Ok(()) => {
                                    debug!(copied = ledger.recorded_len(), "Checkpoint written");
                                    if let Some(callback) = progress {
                                        callback.on_checkpoint(&state);
                                    }
                                }
                                Err(e) => warn!(error = %e, "Checkpoint not written"),
                            }
                        }
                    }
                }
            });
        }

        outcome.cancelled = skipped > 0;
        outcome.destination_paths = destinations.into_iter().flatten().collect();
        outcome.copied_count = outcome.destination_paths.len();

        let carried: Vec<PathBuf> = ledger
            .unclaimed()
            .filter(|dest| dest.starts_with(root) && dest.is_file())
            .map(Path::to_path_buf)
            .collect();
        if !carried.is_empty() {
            info!(count = carried.len(), "Keeping files copied by an earlier attempt for unselected entries");
            outcome.destination_paths.extend(carried);
        }

        if let Some(path) = resume_path {
            if outcome.is_complete() {
                if let Err(e) = ResumeState::remove(path) {
                    warn!(error = %e, "Could not remove resume state");
                }
            }
        }

        info!(
            copied = outcome.copied_count,
            new = outcome.newly_copied,
            bytes = outcome.bytes_copied,
            errors = outcome.errors.len(),
            cancelled = outcome.cancelled,
            "Copy finished"
        );
        if let Some(callback) = progress {
            callback.on_copy_completed(&outcome);
        }
        Ok(outcome)
    }

    /// Find a destination already holding a copy of `entry` from an earlier
    /// attempt, without claiming one that belongs to another entry.
    fn find_existing_copy(
        &self,
        ledger: &CopyLedger,
        entry: &MediaEntry,
        preferred: &Path,
    ) -> Option<PathBuf> {
        if let Some(dest) = ledger.recorded_destination(&entry.path) {
            if !ledger.is_claimed(dest) && dest.is_file() {
                return Some(dest.to_path_buf());
            }
        }

        for n in 0..=MAX_COLLISION_SUFFIX {
            let candidate = fs_ops::collision_candidate(preferred, n);
            if !candidate.exists() {
                return None;
            }
            if ledger.is_claimed(&candidate) {
                continue;
            }
            match ledger.recorded_source(&candidate) {
                Some(source) if source == entry.path => return Some(candidate),
                Some(_) => continue,
                None if ledger.is_recorded(&candidate) => return Some(candidate),
                None => {}
            }
            if fs_ops::is_copy_of(entry, &candidate, self.options.verify) {
                return Some(candidate);
            }
        }
        None
    }
}
