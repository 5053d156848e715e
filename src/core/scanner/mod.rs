//! # Scanner Module
//!
//! Discovers media files under a root directory.
//!
//! Discovery walks the tree and yields regular files only; symbolic links and
//! special files never reach callers. Which files are kept is decided by
//! [`MediaFilter`], a pure predicate applied after enumeration.
//!
//! ## Example
//! ```rust,ignore
//! use media_archiver::core::scanner::{DiscoveryOptions, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(DiscoveryOptions::videos(&["mp4", "mov"]));
//! let result = scanner.discover(Path::new("/srv/inbox"))?;
//! ```

mod filter;
mod walker;

pub use filter::{
    is_partial_output, FilterDecision, MediaFilter, COPY_PARTIAL_SUFFIX, PARTIAL_SUFFIX,
};
pub use walker::{DiscoveryOptions, ScanResult, WalkDirScanner};

use crate::core::metadata::{DateResolution, DateSource};
use crate::core::timestamps::FileTimes;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Filesystem facts about a discovered file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub size: u64,
    pub times: FileTimes,
}

/// A discovered file under consideration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Absolute source path
    pub path: PathBuf,
    /// File name with its original case
    pub name: String,
    /// Extension, lower-cased; empty when there is none
    pub extension: String,
    pub stats: FileStats,
    /// Date used to pick the archive folder
    pub filing_date: NaiveDateTime,
    /// Where `filing_date` came from
    pub filing_date_source: DateSource,
}

impl MediaFile {
    /// Build a record whose filing date defaults to the creation time
    pub fn new(path: PathBuf, stats: FileStats) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = lowercase_extension(&path);
        let filing_date = local_naive(stats.times.created);

        Self {
            path,
            name,
            extension,
            stats,
            filing_date,
            filing_date_source: DateSource::Filesystem,
        }
    }

    /// Apply a resolver result, consuming the unenriched record
    pub fn with_resolution(mut self, resolution: &DateResolution) -> Self {
        self.filing_date = resolution.date;
        self.filing_date_source = resolution.source;
        self
    }

    /// File name without its extension, original case
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.extension.eq_ignore_ascii_case(extension)
    }
}

/// Lower-cased extension of a path, or an empty string
pub fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Convert a platform timestamp to a local wall-clock date
pub fn local_naive(time: std::time::SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}
