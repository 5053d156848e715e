//! Types for the filing module.

use crate::core::metadata::DateSource;
use crate::core::outcome::{FileOutcome, OutcomeCounts};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a file goes in the archive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilingPlan {
    /// `{archive}/{YYYY}/{YYYY}-{MM}`
    pub destination_directory: PathBuf,
    /// `destination_directory` joined with the original file name
    pub destination_path: PathBuf,
}

/// Information about a file to be filed, for previews
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedFile {
    pub source: PathBuf,
    pub plan: FilingPlan,
    /// ISO date used for placement
    pub date: String,
    pub date_source: DateSource,
    pub size_bytes: u64,
    /// Something already sits at the destination; the file will be skipped
    pub destination_exists: bool,
    /// An earlier file in the same batch maps to the same destination
    pub conflicts_in_batch: bool,
}

/// Summary of files by year
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearSummary {
    pub year: i32,
    pub count: usize,
    pub size_bytes: u64,
}

/// A dry look at what filing would do
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingPreview {
    pub files: Vec<PlannedFile>,
    pub total_size_bytes: u64,
    /// (earliest, latest) filing dates
    pub date_range: Option<(String, String)>,
    /// Newest year first
    pub by_year: Vec<YearSummary>,
    pub from_metadata: usize,
    pub from_filesystem: usize,
    pub conflict_count: usize,
}

/// Result of a filing pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilingReport {
    pub outcomes: Vec<FileOutcome>,
    pub folders_created: usize,
    pub bytes_moved: u64,
    pub duration_ms: u64,
}

impl FilingReport {
    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts::tally(&self.outcomes)
    }
}
