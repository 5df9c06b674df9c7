//! # Media Sampler Engine - Random Media Sampling Library
//!
//! A headless engine that builds a random sample of photos and videos from
//! one or more source folders and copies it into a destination folder.
//! Designed as the foundation for multiple front ends (CLI, automation).
//!
//! ## Overview
//!
//! It features:
//! - Recursive media discovery with a per-folder scan cache
//! - Size, date, extension and media-type filters
//! - Seedable selection by file count or total size, optionally balanced
//!   across source folders
//! - Parallel copying with collision-free names, resumable after interruption
//! - A selection log per run, and undo of a run from that log
//! - Progress reporting via callbacks (decoupled from UI technology)
//!
//! ## Basic Usage
//!
//! ```no_run
//! use sampler_engine::{run_job, JobOutcome, SamplerConfig, SelectionBudget};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = SamplerConfig::new(
//!     vec!["/photos/2023".into(), "/photos/2024".into()],
//!     "/tmp/sample",
//!     SelectionBudget::ByCount(50),
//! );
//! config.balanced = true;
//!
//! match run_job(&config, None, None)? {
//!     JobOutcome::Copied(report) => {
//!         println!("Copied {} files", report.outcome.copied_count);
//!     }
//!     other => println!("{:?}", other),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (MediaEntry, DirectoryInventory, budgets)
//! - **error**: Error types and handling
//! - **size**: Human-readable size parsing
//! - **inventory**: Directory scanning and the scan cache
//! - **filter**: Selection filters
//! - **selector**: Random selection by count or size
//! - **fs_ops**: Low-level filesystem operations
//! - **resume**: Resume state and checkpoint policy
//! - **copy**: Parallel copy engine
//! - **undo**: Selection log and undo
//! - **config**: Job configuration
//! - **job**: Job orchestration (plan, run)
//! - **progress**: Progress callback trait
//! - **checksums**: Checksum computation for verify-after-copy

pub mod model;
pub mod error;
pub mod size;
pub mod inventory;
pub mod filter;
pub mod selector;
pub mod fs_ops;
pub mod resume;
pub mod copy;
pub mod undo;
pub mod config;
pub mod job;
pub mod progress;
pub mod checksums;

// Re-export main types and functions
pub use model::{DirectoryInventory, MediaEntry, MediaType, SelectionBudget, SelectionStats};
pub use error::{EngineError, Result};
pub use size::parse_size;
pub use filter::SelectionFilter;
pub use resume::{CheckpointPolicy, ResumeState};
pub use copy::{CancelToken, CopyEngine, CopyEvent, CopyFailure, CopyOptions, CopyOutcome};
pub use undo::{undo, SelectionLog, UndoOutcome, UndoSummary};
pub use config::SamplerConfig;
pub use job::{plan_selection, run_job, CopyReport, DryRunReport, JobOutcome, SelectionPlan};
pub use progress::ProgressCallback;
pub use checksums::{compute_file_checksum, ChecksumAlgorithm, ChecksumValue};
