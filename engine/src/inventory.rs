//! Media inventory: directory walking plus a per-directory scan cache.
//!
//! A scan walks a source directory recursively and keeps the regular files
//! whose extension is a known image or video extension. The unfiltered result
//! is cached in `<dir>/.media_cache`; filters are applied after the cache, so
//! one cache serves every filter combination.
//!
//! A cache is trusted only while its modification time is strictly newer than
//! the source directory's. Changes nested below the top level that leave the
//! top-level directory mtime untouched are not detected.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{EngineError, Result};
use crate::filter::{self, SelectionFilter};
use crate::model::{normalized_extension, DirectoryInventory, MediaEntry, MediaType};

/// File name of the per-directory cache.
pub const CACHE_FILE_NAME: &str = ".media_cache";

const CACHE_VERSION: u32 = 1;

/// Upper bound on concurrent directory scans.
const MAX_SCAN_THREADS: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<MediaEntry>,
}

/// Path of the cache file for `dir`.
pub fn cache_path(dir: &Path) -> PathBuf {
    dir.join(CACHE_FILE_NAME)
}

/// Scan several source directories.
///
/// With more than one directory the scans run concurrently on a small pool;
/// a single directory is scanned inline. The result keeps the input order.
/// A directory that cannot be scanned contributes an empty entry list.
pub fn scan_directories(
    dirs: &[PathBuf],
    filter: Option<&SelectionFilter>,
    use_cache: bool,
) -> DirectoryInventory {
    let scanned: Vec<Vec<MediaEntry>> = if dirs.len() > 1 {
        let threads = dirs.len().min(MAX_SCAN_THREADS);
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("scan-worker-{}", i))
            .build()
        {
            Ok(pool) => pool.install(|| {
                dirs.par_iter()
                    .map(|dir| scan_directory(dir, filter, use_cache))
                    .collect()
            }),
            Err(e) => {
                warn!(error = %e, "Scan pool unavailable, scanning sequentially");
                dirs.iter()
                    .map(|dir| scan_directory(dir, filter, use_cache))
                    .collect()
            }
        }
    } else {
        dirs.iter()
            .map(|dir| scan_directory(dir, filter, use_cache))
            .collect()
    };

    let mut inventory = DirectoryInventory::new();
    for (dir, entries) in dirs.iter().zip(scanned) {
        inventory.push(dir.clone(), entries);
    }
    inventory
}

/// Scan one source directory and return the entries passing `filter`.
///
/// Never fails: a directory-level failure is logged and yields no entries.
pub fn scan_directory(
    dir: &Path,
    filter: Option<&SelectionFilter>,
    use_cache: bool,
) -> Vec<MediaEntry> {
    if use_cache {
        match load_cache(dir) {
            Ok(Some(entries)) => {
                debug!(dir = %dir.display(), entries = entries.len(), "Using cached inventory");
                return filter::apply(entries, filter);
            }
            Ok(None) => debug!(dir = %dir.display(), "No valid inventory cache"),
            Err(e) => warn!(error = %e, "Ignoring inventory cache"),
        }
    }

    let entries = match walk_media_files(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Skipping source directory");
            return Vec::new();
        }
    };
    info!(dir = %dir.display(), entries = entries.len(), "Scanned source directory");

    if use_cache {
        if let Err(e) = save_cache(dir, &entries) {
            warn!(error = %e, "Could not write inventory cache");
        }
    }

    filter::apply(entries, filter)
}

/// Walk `dir` recursively and collect every media file, unfiltered.
///
/// Fails only when `dir` itself cannot be read. Files and subdirectories that
/// cannot be read are logged and skipped.
pub fn walk_media_files(dir: &Path) -> Result<Vec<MediaEntry>> {
    let metadata = fs::metadata(dir).map_err(|e| EngineError::Discovery {
        path: dir.to_path_buf(),
        source: e,
    })?;
    if !metadata.is_dir() {
        return Err(EngineError::Discovery {
            path: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        });
    }

    let mut entries = Vec::new();
    for item in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let item = match item {
            Ok(item) => item,
            Err(e) if e.depth() == 0 => {
                return Err(EngineError::Discovery {
                    path: dir.to_path_buf(),
                    source: e.into(),
                });
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                warn!(error = %EngineError::Stat { path, source: e.into() }, "Skipping unreadable entry");
                continue;
            }
        };

        if !item.file_type().is_file() || item.file_name() == CACHE_FILE_NAME {
            continue;
        }
        let Some(extension) = normalized_extension(item.path()) else {
            continue;
        };
        let Some(media_type) = MediaType::from_extension(&extension) else {
            continue;
        };

        match entry_from_metadata(item.path(), extension, media_type) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(error = %e, "Skipping file"),
        }
    }
    Ok(entries)
}

fn entry_from_metadata(path: &Path, extension: String, media_type: MediaType) -> Result<MediaEntry> {
    let stat_error = |source: io::Error| EngineError::Stat {
        path: path.to_path_buf(),
        source,
    };
    let metadata = fs::metadata(path).map_err(stat_error)?;
    let modified = metadata.modified().map_err(stat_error)?;

    Ok(MediaEntry {
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
        created_at: metadata.created().ok().map(DateTime::<Utc>::from),
        modified_at: DateTime::<Utc>::from(modified),
        extension,
        media_type,
    })
}

/// Load the cached unfiltered entries for `dir`.
///
/// Returns Ok(None) when there is no cache or it is not strictly newer than
/// the directory. Unreadable or mismatched caches are errors the caller treats
/// as a miss.
pub fn load_cache(dir: &Path) -> Result<Option<Vec<MediaEntry>>> {
    let path = cache_path(dir);
    let cache_error = |reason: String| EngineError::Cache {
        path: path.clone(),
        reason,
    };

    let cache_mtime = match fs::metadata(&path) {
        Ok(md) => md.modified().map_err(|e| cache_error(e.to_string()))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(cache_error(e.to_string())),
    };
    let dir_mtime = fs::metadata(dir)
        .and_then(|md| md.modified())
        .map_err(|e| cache_error(e.to_string()))?;

    if cache_mtime <= dir_mtime {
        return Ok(None);
    }

    let file = fs::File::open(&path).map_err(|e| cache_error(e.to_string()))?;
    let cache: CacheFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| cache_error(e.to_string()))?;
    if cache.version != CACHE_VERSION {
        return Err(cache_error(format!("unsupported cache version {}", cache.version)));
    }
    Ok(Some(cache.entries))
}

/// Persist the unfiltered entries of `dir` to its cache file.
///
/// The file is rewritten in place so that refreshing an existing cache does
/// not touch the directory's own modification time.
pub fn save_cache(dir: &Path, entries: &[MediaEntry]) -> Result<()> {
    let path = cache_path(dir);
    let cache_error = |reason: String| EngineError::Cache {
        path: path.clone(),
        reason,
    };

    let file = fs::File::create(&path).map_err(|e| cache_error(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    let cache = CacheFile {
        version: CACHE_VERSION,
        entries: entries.to_vec(),
    };
    serde_json::to_writer(&mut writer, &cache).map_err(|e| cache_error(e.to_string()))?;
    writer.flush().map_err(|e| cache_error(e.to_string()))?;
    Ok(())
}
