//! Aggregated results of a run.

use crate::core::convert::NormalizeReport;
use crate::core::dedup::DedupReport;
use crate::core::filing::FilingReport;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why the filing pass did not run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingDeferral {
    /// Files modified within the stability threshold
    pub unstable: Vec<PathBuf>,
    /// Videos whose normalized output does not exist yet
    pub unconverted: Vec<PathBuf>,
}

impl FilingDeferral {
    pub fn is_empty(&self) -> bool {
        self.unstable.is_empty() && self.unconverted.is_empty()
    }
}

/// Everything one invocation did, stage by stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<NormalizeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deferred: Option<FilingDeferral>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filing: Option<FilingReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup: Option<DedupReport>,
    pub pruned_dirs: usize,
    /// Discovery and metadata notes
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

/// Headline numbers of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub converted: usize,
    pub passthrough: usize,
    pub duplicates: usize,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Local::now(),
            normalization: None,
            deferred: None,
            filing: None,
            dedup: None,
            pruned_dirs: 0,
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        if let Some(normalization) = &self.normalization {
            let counts = normalization.counts();
            summary.converted = normalization.encoded();
            summary.passthrough = normalization.passed_through();
            summary.skipped += counts.skipped;
            summary.failed += counts.failed;
        }
        if let Some(filing) = &self.filing {
            let counts = filing.counts();
            summary.moved = counts.done;
            summary.skipped += counts.skipped;
            summary.failed += counts.failed;
        }
        if let Some(dedup) = &self.dedup {
            summary.duplicates = dedup.duplicates();
            summary.skipped += dedup.near_misses();
            summary.failed += dedup
                .outcomes
                .iter()
                .filter(|o| o.is_failed())
                .count();
        }
        summary
    }

    /// True when any stage recorded a per-file failure
    pub fn has_failures(&self) -> bool {
        self.summary().failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::outcome::{Action, FileOutcome, SkipReason};

    #[test]
    fn summary_adds_up_stages() {
        let mut report = RunReport::new("run-1");
        report.filing = Some(FilingReport {
            outcomes: vec![
                FileOutcome::done(
                    "/inbox/a.jpg",
                    Action::Moved {
                        destination: PathBuf::from("/archive/2024/2024-01/a.jpg"),
                    },
                ),
                FileOutcome::skipped("/inbox/b.txt", SkipReason::ExtensionNotAllowed),
            ],
            ..FilingReport::default()
        });
        report.normalization = Some(NormalizeReport {
            outcomes: vec![
                FileOutcome::done(
                    "/inbox/c.mov",
                    Action::Encoded {
                        output: PathBuf::from("/inbox/c.mp4"),
                    },
                ),
                FileOutcome::failed("/inbox/d.avi", "encoder exited with status 1"),
            ],
            duration_ms: 0,
        });

        let summary = report.summary();

        assert_eq!(summary.moved, 1);
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert!(report.has_failures());
    }

    #[test]
    fn empty_stages_are_not_serialized() {
        let json = serde_json::to_string(&RunReport::new("run-2")).unwrap();
        assert!(json.contains("\"run_id\":\"run-2\""));
        assert!(!json.contains("filing"));
    }
}
