//! Selection log and undo.
//!
//! Every completed copy writes `selection_log.json` into the destination
//! directory. It lists every destination written for the selection,
//! including files copied by earlier interrupted attempts. Undo reads that
//! log, deletes the listed files and then the log itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::filter::SelectionFilter;
use crate::fs_ops;
use crate::model::SelectionStats;

/// File name of the selection log inside the destination directory.
pub const SELECTION_LOG_FILE_NAME: &str = "selection_log.json";

/// Path of the selection log for `destination_dir`.
pub fn selection_log_path(destination_dir: &Path) -> PathBuf {
    destination_dir.join(SELECTION_LOG_FILE_NAME)
}

/// Record of one completed sampling operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionLog {
    pub operation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub destination: PathBuf,
    pub total_selected: usize,

    /// Destination paths written by the operation, in selection order
    pub files: Vec<PathBuf>,

    pub stats: SelectionStats,

    #[serde(default)]
    pub filters_applied: Option<SelectionFilter>,
}

impl SelectionLog {
    /// Write the log to `<destination>/selection_log.json` atomically.
    pub fn save(&self) -> Result<PathBuf> {
        let path = selection_log_path(&self.destination);
        fs_ops::write_json_atomic(&path, self)?;
        Ok(path)
    }

    /// Load the log of `destination_dir`. A missing log is Ok(None).
    pub fn load(destination_dir: &Path) -> Result<Option<SelectionLog>> {
        let path = selection_log_path(destination_dir);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::persistence(path, e)),
        };
        let log = serde_json::from_str(&raw).map_err(|e| EngineError::persistence(&path, e))?;
        Ok(Some(log))
    }
}

/// A listed file that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoSummary {
    pub deleted: usize,
    /// Listed files that no longer existed
    pub missing: usize,
    pub failures: Vec<UndoFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// No selection log in the destination directory
    NothingToUndo,
    Completed(UndoSummary),
}

/// Delete every file listed in the selection log of `destination_dir`, then
/// the log itself.
///
/// Missing files are counted, not treated as errors; files that fail to
/// delete are reported in the summary. Running undo again finds no log and
/// returns `NothingToUndo`.
///
/// # Errors
/// Returns EngineError::Persistence if the log exists but cannot be read or
/// removed.
pub fn undo(destination_dir: &Path) -> Result<UndoOutcome> {
    let Some(log) = SelectionLog::load(destination_dir)? else {
        info!(destination = %destination_dir.display(), "No selection log, nothing to undo");
        return Ok(UndoOutcome::NothingToUndo);
    };

    let mut summary = UndoSummary::default();
    for path in &log.files {
        match fs::remove_file(path) {
            Ok(()) => summary.deleted += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => summary.missing += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not delete file");
                summary.failures.push(UndoFailure {
                    path: path.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    let log_path = selection_log_path(destination_dir);
    fs::remove_file(&log_path).map_err(|e| EngineError::persistence(&log_path, e))?;

    info!(
        operation_id = %log.operation_id,
        deleted = summary.deleted,
        missing = summary.missing,
        failed = summary.failures.len(),
        "Undo finished"
    );
    Ok(UndoOutcome::Completed(summary))
}
