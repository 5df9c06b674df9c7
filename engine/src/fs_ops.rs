//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Resolving destination paths and their collision-suffixed candidates
//! - Copying files with metadata preservation and no-clobber publishing
//! - Removing staging files left behind by an interrupted copy
//! - Creating directories recursively
//! - Writing JSON documents atomically

use filetime::FileTime;
use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::checksums::{self, ChecksumAlgorithm};
use crate::error::EngineError;
use crate::model::MediaEntry;

/// Highest numeric suffix tried before a copy gives up on finding a free name.
pub const MAX_COLLISION_SUFFIX: u32 = 100_000;

/// Prefix of staging files written next to their final destination.
pub const STAGING_PREFIX: &str = ".sampler-partial-";

/// Preferred destination of `entry` under `root`, before collision handling.
///
/// With `preserve_structure` the file lands under a folder named after its
/// immediate parent directory; otherwise directly under `root`.
pub fn destination_for(entry: &MediaEntry, root: &Path, preserve_structure: bool) -> PathBuf {
    let file_name = entry
        .path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| entry.path.clone());

    if preserve_structure {
        if let Some(parent_name) = entry.parent_dir_name() {
            return root.join(parent_name).join(file_name);
        }
    }
    root.join(file_name)
}

/// The `n`-th collision candidate for `preferred`.
///
/// `n == 0` is `preferred` itself; otherwise `_n` goes before the extension:
/// `photo.jpg` -> `photo_1.jpg`, `archive` -> `archive_1`.
pub fn collision_candidate(preferred: &Path, n: u32) -> PathBuf {
    if n == 0 {
        return preferred.to_path_buf();
    }
    let stem = preferred
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match preferred.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    preferred.with_file_name(name)
}

/// Result of a successful copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedFile {
    /// Final, collision-free destination
    pub destination: PathBuf,
    pub bytes: u64,
}

/// Copy `src` to the first free collision candidate of `preferred`.
///
/// The bytes go to a staging file next to the destination first; permissions
/// and access/modification times are copied from the source, and the staging
/// file is then renamed without clobbering onto `preferred`, `preferred_1`, ...
/// Losing a name to a concurrent writer just moves on to the next candidate,
/// and no partially written file ever appears under a final name.
///
/// With `verify`, source and staged bytes are compared before publishing.
pub fn copy_to_unique_destination(
    src: &Path,
    preferred: &Path,
    verify: Option<ChecksumAlgorithm>,
) -> Result<CopiedFile, EngineError> {
    let copy_error = |source: io::Error| EngineError::Copy {
        path: src.to_path_buf(),
        destination: preferred.to_path_buf(),
        source,
    };

    ensure_parent_dir_exists(preferred)?;
    let parent = preferred.parent().unwrap_or_else(|| Path::new("."));

    let mut src_file = fs::File::open(src).map_err(copy_error)?;
    let src_metadata = src_file.metadata().map_err(copy_error)?;

    let mut staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(parent)
        .map_err(copy_error)?;

    let bytes = io::copy(&mut src_file, staged.as_file_mut()).map_err(copy_error)?;
    staged.as_file().sync_all().map_err(copy_error)?;

    // Timestamps first: changing permissions could make the file read-only.
    let atime = FileTime::from_last_access_time(&src_metadata);
    let mtime = FileTime::from_last_modification_time(&src_metadata);
    filetime::set_file_times(staged.path(), atime, mtime).map_err(copy_error)?;
    fs::set_permissions(staged.path(), src_metadata.permissions()).map_err(copy_error)?;

    if let Some(algorithm) = verify {
        let matches = checksums::files_match(src, staged.path(), algorithm).map_err(copy_error)?;
        if !matches {
            return Err(copy_error(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} checksum mismatch after copy", algorithm),
            )));
        }
    }

    publish_no_clobber(staged, preferred)
        .map(|destination| CopiedFile { destination, bytes })
        .map_err(copy_error)
}

fn publish_no_clobber(mut staged: NamedTempFile, preferred: &Path) -> io::Result<PathBuf> {
    for n in 0..=MAX_COLLISION_SUFFIX {
        let candidate = collision_candidate(preferred, n);
        match staged.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => staged = e.file,
            Err(e) => return Err(e.error),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name after {} attempts", MAX_COLLISION_SUFFIX),
    ))
}

/// True when `candidate` looks like a copy of `entry`: same size, same
/// modification second, and, with `verify`, the same content.
pub fn is_copy_of(entry: &MediaEntry, candidate: &Path, verify: Option<ChecksumAlgorithm>) -> bool {
    let Ok(metadata) = fs::metadata(candidate) else {
        return false;
    };
    if !metadata.is_file() || metadata.len() != entry.size_bytes {
        return false;
    }
    let mtime = FileTime::from_last_modification_time(&metadata);
    if mtime.unix_seconds() != entry.modified_at.timestamp() {
        return false;
    }
    match verify {
        Some(algorithm) => checksums::files_match(&entry.path, candidate, algorithm).unwrap_or(false),
        None => true,
    }
}

/// Delete staging files under `root` left by a copy that was killed before
/// it could publish or discard them. Returns how many were removed.
///
/// Looks at `root` and its immediate subdirectories, the only places a copy
/// stages files.
pub fn remove_stale_staging_files(root: &Path) -> usize {
    let mut removed = 0;
    for item in WalkDir::new(root).min_depth(1).max_depth(2).follow_links(false) {
        let Ok(item) = item else {
            continue;
        };
        if !item.file_type().is_file() || !item.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            continue;
        }
        match fs::remove_file(item.path()) {
            Ok(()) => {
                debug!(path = %item.path().display(), "Removed stale staging file");
                removed += 1;
            }
            Err(e) => warn!(path = %item.path().display(), error = %e, "Could not remove stale staging file"),
        }
    }
    removed
}

/// Ensure the parent directory of a path exists, creating it if necessary.
///
/// # Errors
/// Returns EngineError if directory creation fails
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        // Skip if parent is empty path (relative root)
        if parent.as_os_str().is_empty() {
            return Ok(());
        }

        match fs::metadata(parent) {
            Ok(metadata) => {
                if metadata.is_dir() {
                    Ok(())
                } else {
                    Err(EngineError::DestinationUnavailable {
                        path: parent.to_path_buf(),
                        source: io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "Parent path exists but is not a directory",
                        ),
                    })
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(parent).map_err(|e| EngineError::DestinationUnavailable {
                    path: parent.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => Err(EngineError::DestinationUnavailable {
                path: parent.to_path_buf(),
                source: e,
            }),
        }
    } else {
        Ok(())
    }
}

/// Serialize `value` as pretty JSON to `path`, replacing any previous file
/// atomically: readers see either the old or the new document, never a mix.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), EngineError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let staged = NamedTempFile::new_in(parent).map_err(|e| EngineError::persistence(path, e))?;
    {
        let mut writer = BufWriter::new(staged.as_file());
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| EngineError::persistence(path, e))?;
        writer.flush().map_err(|e| EngineError::persistence(path, e))?;
    }
    staged
        .as_file()
        .sync_all()
        .map_err(|e| EngineError::persistence(path, e))?;
    staged
        .persist(path)
        .map_err(|e| EngineError::persistence(path, e.error))?;
    Ok(())
}
