//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which keeps the engine
//! independent of any particular UI. The CLI implements it for stderr output.

use std::path::Path;

use crate::copy::{CopyEvent, CopyOutcome};
use crate::model::SelectionStats;
use crate::resume::ResumeState;

/// Trait for receiving progress updates from a sampling job.
///
/// Every method has an empty default, so implementors only override what they
/// display. All calls are made from the coordinating thread, never from a
/// copy worker, so an implementation always sees completions one at a time.
pub trait ProgressCallback: Send {
    /// Called once per source directory after it has been scanned and filtered.
    fn on_directory_scanned(&self, _dir: &Path, _stats: &SelectionStats) {}

    /// Called when the selection has been made.
    fn on_selection_made(&self, _stats: &SelectionStats) {}

    /// Called before copying starts. `already_done` entries need no copy.
    fn on_copy_started(&self, _total: usize, _already_done: usize) {}

    /// Called as each pending file is copied, fails, or is cancelled.
    ///
    /// `completed` counts pending files processed so far, out of `total`.
    fn on_file_completed(&self, _completed: usize, _total: usize, _event: &CopyEvent) {}

    /// Called after a resume checkpoint has been written.
    fn on_checkpoint(&self, _state: &ResumeState) {}

    /// Called when the copy phase is over.
    fn on_copy_completed(&self, _outcome: &CopyOutcome) {}
}
