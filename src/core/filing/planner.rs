//! Maps files to their place in the archive.

use super::types::*;
use crate::core::metadata::DateSource;
use crate::core::scanner::MediaFile;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Computes filing plans. Pure: plans depend only on the archive root,
/// the file name and the filing date.
#[derive(Debug, Clone)]
pub struct FilingPlanner {
    archive_root: PathBuf,
}

impl FilingPlanner {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
        }
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    /// Plan a single file. Total: every file gets exactly one plan.
    pub fn plan(&self, file: &MediaFile) -> FilingPlan {
        let destination_directory = self.archive_root.join(Self::folder_for(file.filing_date));
        let destination_path = destination_directory.join(&file.name);

        FilingPlan {
            destination_directory,
            destination_path,
        }
    }

    /// Relative folder for a date: `YYYY/YYYY-MM`
    pub fn folder_for(date: NaiveDateTime) -> PathBuf {
        let year = date.year();
        let month = date.month();
        PathBuf::from(format!("{:04}", year)).join(format!("{:04}-{:02}", year, month))
    }

    /// Plan a batch and summarise it without touching anything
    pub fn preview(&self, files: &[MediaFile]) -> FilingPreview {
        let mut planned = Vec::with_capacity(files.len());
        let mut by_year: BTreeMap<i32, (usize, u64)> = BTreeMap::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut earliest: Option<NaiveDate> = None;
        let mut latest: Option<NaiveDate> = None;
        let mut total_size = 0u64;
        let mut from_metadata = 0;
        let mut conflict_count = 0;

        for file in files {
            let plan = self.plan(file);
            let date = file.filing_date.date();
            total_size += file.stats.size;

            earliest = Some(earliest.map_or(date, |e| e.min(date)));
            latest = Some(latest.map_or(date, |l| l.max(date)));

            let entry = by_year.entry(date.year()).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += file.stats.size;

            if file.filing_date_source == DateSource::Metadata {
                from_metadata += 1;
            }

            let destination_exists = plan.destination_path.exists();
            let conflicts_in_batch = !seen.insert(plan.destination_path.clone());
            if destination_exists || conflicts_in_batch {
                conflict_count += 1;
            }

            planned.push(PlannedFile {
                source: file.path.clone(),
                date: date.to_string(),
                date_source: file.filing_date_source,
                size_bytes: file.stats.size,
                destination_exists,
                conflicts_in_batch,
                plan,
            });
        }

        let by_year = by_year
            .into_iter()
            .rev()
            .map(|(year, (count, size_bytes))| YearSummary {
                year,
                count,
                size_bytes,
            })
            .collect();

        let date_range = match (earliest, latest) {
            (Some(e), Some(l)) => Some((e.to_string(), l.to_string())),
            _ => None,
        };

        FilingPreview {
            total_size_bytes: total_size,
            date_range,
            by_year,
            from_metadata,
            from_filesystem: files.len() - from_metadata,
            conflict_count,
            files: planned,
        }
    }
}
