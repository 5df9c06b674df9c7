//! Core data model for sampling jobs.
//!
//! This module defines the main data structures shared by every stage:
//! - MediaEntry: one media file discovered by a scan
//! - DirectoryInventory: the entries found under each source directory
//! - SelectionBudget: how much to select (by count or by total size)
//! - SelectionStats: count/size/extension breakdown of a set of entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions (lowercase, without the dot) classified as images.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "svg", "ico", "heic", "heif",
];

/// Extensions (lowercase, without the dot) classified as videos.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v", "flv"];

/// Kind of media a file holds.
///
/// Scans only ever produce `Image` or `Video`; `Other` and `Unknown` are kept
/// so richer metadata extraction can classify files later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Other,
    Unknown,
}

impl MediaType {
    /// Classify a lowercase extension. Returns None for non-media extensions.
    pub fn from_extension(ext: &str) -> Option<Self> {
        if IMAGE_EXTENSIONS.contains(&ext) {
            Some(MediaType::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Some(MediaType::Video)
        } else {
            None
        }
    }

    /// Parse a user-supplied media type name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "image" => Some(MediaType::Image),
            "video" => Some(MediaType::Video),
            "other" => Some(MediaType::Other),
            "unknown" => Some(MediaType::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Image => write!(f, "image"),
            MediaType::Video => write!(f, "video"),
            MediaType::Other => write!(f, "other"),
            MediaType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Lowercase extension of `path` without the leading dot.
pub fn normalized_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// A single media file found by a scan. Identity is `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    /// Absolute path of the file
    pub path: PathBuf,

    /// File size in bytes
    pub size_bytes: u64,

    /// Creation time, when the platform reports one
    pub created_at: Option<DateTime<Utc>>,

    /// Last modification time
    pub modified_at: DateTime<Utc>,

    /// Lowercase extension without the dot
    pub extension: String,

    pub media_type: MediaType,
}

impl MediaEntry {
    /// Name of the directory directly containing this file.
    pub fn parent_dir_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.parent().and_then(|p| p.file_name())
    }
}

/// Entries discovered under each source directory, in source order.
#[derive(Debug, Clone, Default)]
pub struct DirectoryInventory {
    dirs: Vec<(PathBuf, Vec<MediaEntry>)>,
}

impl DirectoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, dir: PathBuf, entries: Vec<MediaEntry>) {
        self.dirs.push((dir, entries));
    }

    /// Iterate over `(source directory, entries)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[MediaEntry])> {
        self.dirs.iter().map(|(d, e)| (d.as_path(), e.as_slice()))
    }

    /// Entries found under `dir`, if it was scanned.
    pub fn entries_for(&self, dir: &Path) -> Option<&[MediaEntry]> {
        self.dirs
            .iter()
            .find(|(d, _)| d == dir)
            .map(|(_, e)| e.as_slice())
    }

    /// Number of source directories (including ones that yielded nothing).
    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn total_files(&self) -> usize {
        self.dirs.iter().map(|(_, e)| e.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_files() == 0
    }

    /// All entries of all directories, concatenated in source order.
    pub fn all_entries(&self) -> Vec<MediaEntry> {
        self.dirs
            .iter()
            .flat_map(|(_, e)| e.iter().cloned())
            .collect()
    }
}

/// How much to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionBudget {
    /// Select this many files
    ByCount(usize),
    /// Select files up to this many bytes in total
    BySize(u64),
}

impl fmt::Display for SelectionBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionBudget::ByCount(n) => write!(f, "{} files", n),
            SelectionBudget::BySize(bytes) => write!(f, "{} bytes", bytes),
        }
    }
}

/// Count, total size and per-extension breakdown of a set of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionStats {
    pub count: usize,
    pub total_size: u64,
    pub types: BTreeMap<String, usize>,
}

impl SelectionStats {
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a MediaEntry>,
    {
        let mut stats = SelectionStats::default();
        for entry in entries {
            stats.count += 1;
            stats.total_size += entry.size_bytes;
            *stats.types.entry(entry.extension.clone()).or_insert(0) += 1;
        }
        stats
    }
}
