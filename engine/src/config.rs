//! Configuration of a sampling job.

use std::path::PathBuf;

use crate::checksums::ChecksumAlgorithm;
use crate::copy::DEFAULT_WORKERS;
use crate::error::{EngineError, Result};
use crate::filter::SelectionFilter;
use crate::model::SelectionBudget;
use crate::resume::RESUME_FILE_NAME;

/// Default number of completions between resume checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 10;

/// Everything needed to run one sampling job.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Directories to sample from, in the order they were given
    pub source_dirs: Vec<PathBuf>,

    pub destination_dir: PathBuf,

    pub budget: SelectionBudget,

    /// Spread the budget evenly across source directories
    pub balanced: bool,

    /// Select and report without copying or writing anything
    pub dry_run: bool,

    pub preserve_structure: bool,

    pub filter: Option<SelectionFilter>,

    /// Resume state location; defaults to `<destination>/operation_resume.json`
    pub resume_path: Option<PathBuf>,

    pub worker_count: usize,

    pub use_cache: bool,

    /// Seed for a reproducible selection; None draws from entropy
    pub seed: Option<u64>,

    pub checkpoint_interval: usize,

    pub verify: Option<ChecksumAlgorithm>,
}

impl SamplerConfig {
    pub fn new(
        source_dirs: Vec<PathBuf>,
        destination_dir: impl Into<PathBuf>,
        budget: SelectionBudget,
    ) -> Self {
        SamplerConfig {
            source_dirs,
            destination_dir: destination_dir.into(),
            budget,
            balanced: false,
            dry_run: false,
            preserve_structure: false,
            filter: None,
            resume_path: None,
            worker_count: DEFAULT_WORKERS,
            use_cache: true,
            seed: None,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            verify: None,
        }
    }

    /// Check the configuration before anything touches the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.source_dirs.is_empty() {
            return Err(EngineError::Config("no source directories given".to_string()));
        }
        if self.destination_dir.as_os_str().is_empty() {
            return Err(EngineError::Config("destination directory is empty".to_string()));
        }
        if self.worker_count == 0 {
            return Err(EngineError::Config("worker count must be at least 1".to_string()));
        }
        if self.budget == SelectionBudget::BySize(0) {
            return Err(EngineError::Config("target size must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Resume state path actually used by the copy.
    pub fn resolved_resume_path(&self) -> PathBuf {
        self.resume_path
            .clone()
            .unwrap_or_else(|| self.destination_dir.join(RESUME_FILE_NAME))
    }
}
