//! Selection filters applied to scanned entries.
//!
//! Every constraint is optional; present constraints are ANDed together.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{MediaEntry, MediaType};

/// Optional constraints on size, modification date, extension and media type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionFilter {
    /// Minimum size in bytes (inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,

    /// Maximum size in bytes (inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,

    /// First local calendar day of modification (inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,

    /// Last local calendar day of modification (inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,

    /// Allowed extensions, lowercase without the dot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeSet<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_types: Option<BTreeSet<MediaType>>,
}

impl SelectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size = Some(bytes);
        self
    }

    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    pub fn with_date_from(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn with_date_to(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    /// Restrict to the given extensions. Accepts ".JPG", "jpg", etc.
    /// An empty list leaves the constraint unset.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self.extensions = if set.is_empty() { None } else { Some(set) };
        self
    }

    pub fn with_media_types<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = MediaType>,
    {
        let set: BTreeSet<MediaType> = types.into_iter().collect();
        self.media_types = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// True when no constraint is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Check a single entry against every present constraint.
    pub fn matches(&self, entry: &MediaEntry) -> bool {
        if let Some(min) = self.min_size {
            if entry.size_bytes < min {
                return false;
            }
        }
        if let Some(max) = self.max_size {
            if entry.size_bytes > max {
                return false;
            }
        }

        if self.date_from.is_some() || self.date_to.is_some() {
            let modified = entry.modified_at.with_timezone(&Local).date_naive();
            if self.date_from.is_some_and(|from| modified < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| modified > to) {
                return false;
            }
        }

        if let Some(extensions) = &self.extensions {
            if !extensions.contains(&entry.extension) {
                return false;
            }
        }
        if let Some(types) = &self.media_types {
            if !types.contains(&entry.media_type) {
                return false;
            }
        }
        true
    }
}

/// Keep the entries matching `filter`. No filter keeps everything.
pub fn apply(entries: Vec<MediaEntry>, filter: Option<&SelectionFilter>) -> Vec<MediaEntry> {
    match filter {
        None => entries,
        Some(f) if f.is_empty() => entries,
        Some(f) => entries.into_iter().filter(|e| f.matches(e)).collect(),
    }
}
