//! Error types for the sampling engine.
//!
//! The primary error type is `EngineError`. Only configuration problems and an
//! unusable destination root stop a job; every other variant is produced for a
//! single directory, file or checkpoint, logged, and the job carries on.
//! Per-file copy failures are recorded in the copy outcome, not returned.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or inconsistent configuration (fatal)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A source directory could not be enumerated; that directory yields no entries
    #[error("Failed to scan directory: {}", path.display())]
    Discovery { path: PathBuf, source: io::Error },

    /// A single file could not be stat'ed during a scan
    #[error("Failed to read metadata: {}", path.display())]
    Stat { path: PathBuf, source: io::Error },

    /// The inventory cache could not be read or written
    #[error("Inventory cache unusable: {} ({reason})", path.display())]
    Cache { path: PathBuf, reason: String },

    /// A single file failed to copy
    #[error("Failed to copy {} -> {}: {source}", path.display(), destination.display())]
    Copy {
        path: PathBuf,
        destination: PathBuf,
        source: io::Error,
    },

    /// A resume state or selection log could not be read or written
    #[error("Failed to persist {}: {source}", path.display())]
    Persistence { path: PathBuf, source: io::Error },

    /// The destination root does not exist and could not be created (fatal)
    #[error("Destination unavailable: {}", path.display())]
    DestinationUnavailable { path: PathBuf, source: io::Error },
}

impl EngineError {
    /// True for errors that must stop the whole job.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::DestinationUnavailable { .. }
        )
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: impl Into<io::Error>) -> Self {
        Self::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }
}
