//! Resume ledger for interrupted copy operations.
//!
//! While a copy runs, the engine periodically checkpoints the destinations it
//! has written to a JSON file (by default `<destination>/operation_resume.json`).
//! The state also lists the selected source files, so a rerun continues the
//! same selection and skips work already done. The file is removed once an
//! operation finishes with no errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::fs_ops;
use crate::model::MediaEntry;

/// Default file name of the resume state inside the destination directory.
pub const RESUME_FILE_NAME: &str = "operation_resume.json";

/// Operation kind recorded by the copy engine.
pub const COPY_OPERATION: &str = "copy_files";

/// Persisted progress of one copy operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeState {
    pub operation: String,
    pub total_files: usize,

    /// Source of every selected entry, in selection order
    #[serde(default)]
    pub selected_files: Vec<PathBuf>,

    /// Every destination written so far, in completion order
    pub copied_files: Vec<PathBuf>,

    /// Destination -> source, for adopting the exact earlier destination
    #[serde(default)]
    pub copied_from: BTreeMap<PathBuf, PathBuf>,

    pub timestamp: DateTime<Utc>,
}

impl ResumeState {
    /// Load the state at `path`. A missing file is Ok(None).
    pub fn load(path: &Path) -> Result<Option<ResumeState>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::persistence(path, e)),
        };
        let state = serde_json::from_str(&raw).map_err(|e| EngineError::persistence(path, e))?;
        Ok(Some(state))
    }

    /// Write the state to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs_ops::write_json_atomic(path, self)
    }

    /// Delete the state at `path`. Deleting a missing file is not an error.
    pub fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::persistence(path, e)),
        }
    }
}

/// When to write a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPolicy {
    /// Checkpoint after every `interval` completions; 0 means only at the end
    pub interval: usize,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        CheckpointPolicy { interval: 10 }
    }
}

impl CheckpointPolicy {
    pub fn every(interval: usize) -> Self {
        CheckpointPolicy { interval }
    }

    /// Whether the `completed`-th completion out of `total` is a checkpoint.
    pub fn should_checkpoint(&self, completed: usize, total: usize) -> bool {
        completed == total || (self.interval > 0 && completed % self.interval == 0)
    }
}

/// In-memory ledger of destinations written by the current and any earlier
/// attempt of an operation. Owned by the copy coordinator.
#[derive(Debug, Default)]
pub(crate) struct CopyLedger {
    copied: Vec<PathBuf>,
    recorded: HashSet<PathBuf>,
    by_source: BTreeMap<PathBuf, PathBuf>,
    copied_from: BTreeMap<PathBuf, PathBuf>,
    claimed: HashSet<PathBuf>,
}

impl CopyLedger {
    pub(crate) fn from_state(state: Option<ResumeState>) -> Self {
        let mut ledger = CopyLedger::default();
        if let Some(state) = state {
            for dest in state.copied_files {
                if ledger.recorded.insert(dest.clone()) {
                    ledger.copied.push(dest);
                }
            }
            for (dest, source) in state.copied_from {
                ledger.by_source.insert(source.clone(), dest.clone());
                ledger.copied_from.insert(dest, source);
            }
        }
        ledger
    }

    pub(crate) fn recorded_len(&self) -> usize {
        self.copied.len()
    }

    /// Destination recorded for `source` by an earlier attempt.
    pub(crate) fn recorded_destination(&self, source: &Path) -> Option<&Path> {
        self.by_source.get(source).map(PathBuf::as_path)
    }

    pub(crate) fn is_recorded(&self, dest: &Path) -> bool {
        self.recorded.contains(dest)
    }

    /// Source recorded for `dest`, if the mapping is known.
    pub(crate) fn recorded_source(&self, dest: &Path) -> Option<&Path> {
        self.copied_from.get(dest).map(PathBuf::as_path)
    }

    pub(crate) fn is_claimed(&self, dest: &Path) -> bool {
        self.claimed.contains(dest)
    }

    /// Recorded destinations that no entry of this run has claimed.
    pub(crate) fn unclaimed(&self) -> impl Iterator<Item = &Path> + '_ {
        self.copied
            .iter()
            .map(PathBuf::as_path)
            .filter(|dest| !self.claimed.contains(*dest))
    }

    /// Mark `dest` as belonging to an entry of this run.
    pub(crate) fn claim(&mut self, dest: &Path) {
        self.claimed.insert(dest.to_path_buf());
    }

    /// Record a destination written (or adopted) for `source`.
    pub(crate) fn record(&mut self, source: &Path, dest: &Path) {
        self.claim(dest);
        if self.recorded.insert(dest.to_path_buf()) {
            self.copied.push(dest.to_path_buf());
        }
        self.by_source.insert(source.to_path_buf(), dest.to_path_buf());
        self.copied_from.insert(dest.to_path_buf(), source.to_path_buf());
    }

    pub(crate) fn snapshot(&self, entries: &[MediaEntry]) -> ResumeState {
        ResumeState {
            operation: COPY_OPERATION.to_string(),
            total_files: entries.len(),
            selected_files: entries.iter().map(|e| e.path.clone()).collect(),
            copied_files: self.copied.clone(),
            copied_from: self.copied_from.clone(),
            timestamp: Utc::now(),
        }
    }
}
