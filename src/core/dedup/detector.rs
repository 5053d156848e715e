//! Duration comparison and deletion of pre-conversion originals.

use super::grouper::{group_siblings, DuplicateGroup};
use crate::core::outcome::{Action, FileOutcome, Outcome, SkipReason};
use crate::core::probe::MediaProber;
use crate::core::scanner::MediaFile;
use crate::error::{ArchiveError, DedupError};
use crate::events::{DedupEvent, Event, EventSender};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Durations closer than this are the same recording
pub const DURATION_TOLERANCE_SECS: f64 = 1.0;

/// Options for duplicate detection
#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub target_container: String,
    pub tolerance_secs: f64,
    /// Report deletions without performing them
    pub dry_run: bool,
    /// Abort on the first probe or delete failure
    pub stop_on_error: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            target_container: "mp4".to_string(),
            tolerance_secs: DURATION_TOLERANCE_SECS,
            dry_run: false,
            stop_on_error: false,
        }
    }
}

/// Result of a detection pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupReport {
    /// Candidate groups examined
    pub groups_checked: usize,
    pub outcomes: Vec<FileOutcome>,
    pub duration_ms: u64,
}

impl DedupReport {
    /// Members deleted, or that would be in a dry run
    pub fn duplicates(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o.outcome,
                    Outcome::Done(Action::DeletedDuplicate { .. } | Action::WouldDelete { .. })
                )
            })
            .count()
    }

    pub fn near_misses(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Skipped(SkipReason::NearMiss { .. })))
            .count()
    }
}

/// Finds non-target siblings whose duration matches the target file
pub struct DuplicateDetector {
    prober: Arc<dyn MediaProber>,
    config: DedupConfig,
}

impl DuplicateDetector {
    pub fn new(prober: Arc<dyn MediaProber>, config: DedupConfig) -> Self {
        Self { prober, config }
    }

    /// Group `files`, compare durations and delete (or report) duplicates
    pub fn run(&self, files: &[MediaFile], events: &EventSender) -> Result<DedupReport, ArchiveError> {
        let start = Instant::now();
        let candidates: Vec<DuplicateGroup> = group_siblings(files, &self.config.target_container)
            .into_iter()
            .filter(DuplicateGroup::is_candidate)
            .collect();
        let total = candidates.len();
        let mut report = DedupReport::default();

        events.send(Event::Dedup(DedupEvent::Started { groups: total }));
        info!(groups = total, "Checking duplicate groups");

        for (i, group) in candidates.iter().enumerate() {
            self.check_group(group, &mut report)?;
            report.groups_checked += 1;
            events.send(Event::Dedup(DedupEvent::GroupChecked {
                completed: i + 1,
                total,
            }));
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        events.send(Event::Dedup(DedupEvent::Completed {
            duplicates: report.duplicates(),
            near_misses: report.near_misses(),
        }));
        Ok(report)
    }

    fn check_group(&self, group: &DuplicateGroup, report: &mut DedupReport) -> Result<(), ArchiveError> {
        let Some(canonical) = group.canonical() else {
            return Ok(());
        };

        let Some(canonical_duration) = self.prober.duration(canonical) else {
            let err = DedupError::UnknownDuration {
                path: canonical.to_path_buf(),
            };
            warn!(path = %canonical.display(), "Cannot probe canonical file, group skipped");
            self.fail_or_abort(canonical, err, report)?;
            return Ok(());
        };

        for member in &group.others {
            let Some(duration) = self.prober.duration(member) else {
                if self.config.stop_on_error {
                    return Err(abort(member, DedupError::UnknownDuration { path: member.clone() }));
                }
                warn!(path = %member.display(), "Duration unknown, kept");
                report
                    .outcomes
                    .push(FileOutcome::skipped(member, SkipReason::UnknownDuration));
                continue;
            };

            let delta = (duration - canonical_duration).abs();
            if delta < self.config.tolerance_secs {
                let outcome = self.remove_duplicate(member, canonical);
                if outcome.is_failed() && self.config.stop_on_error {
                    let reason = match &outcome.outcome {
                        Outcome::Failed { reason } => reason.clone(),
                        _ => String::new(),
                    };
                    return Err(ArchiveError::Aborted {
                        path: member.clone(),
                        reason,
                    });
                }
                report.outcomes.push(outcome);
            } else {
                info!(
                    path = %member.display(),
                    canonical = %canonical.display(),
                    delta_seconds = delta,
                    "Near miss, kept"
                );
                report.outcomes.push(FileOutcome::skipped(
                    member,
                    SkipReason::NearMiss {
                        canonical: canonical.to_path_buf(),
                        delta_seconds: delta,
                    },
                ));
            }
        }
        Ok(())
    }

    fn remove_duplicate(&self, member: &Path, canonical: &Path) -> FileOutcome {
        let canonical = canonical.to_path_buf();
        if self.config.dry_run {
            info!(path = %member.display(), canonical = %canonical.display(), "Would delete duplicate");
            return FileOutcome::done(member, Action::WouldDelete { canonical });
        }

        match fs::remove_file(member) {
            Ok(()) => {
                info!(path = %member.display(), canonical = %canonical.display(), "Deleted duplicate");
                FileOutcome::done(member, Action::DeletedDuplicate { canonical })
            }
            Err(source) => {
                let err = DedupError::Delete {
                    path: member.to_path_buf(),
                    source,
                };
                error!(error = %err, "Delete failed");
                FileOutcome::failed(member, err)
            }
        }
    }

    fn fail_or_abort(&self, path: &Path, err: DedupError, report: &mut DedupReport) -> Result<(), ArchiveError> {
        if self.config.stop_on_error {
            return Err(abort(path, err));
        }
        report.outcomes.push(FileOutcome::failed(path, err));
        Ok(())
    }
}

fn abort(path: &Path, err: DedupError) -> ArchiveError {
    ArchiveError::Aborted {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
