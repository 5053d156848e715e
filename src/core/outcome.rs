//! Per-file outcome records.
//!
//! Every subsystem reports what it did with each file as a [`FileOutcome`]
//! instead of failing the whole batch. Callers aggregate them into reports.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Something that was done to a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Moved into the archive
    Moved { destination: PathBuf },
    /// Re-encoded to the target format
    Encoded { output: PathBuf },
    /// Already in the target format, placed without re-encoding
    Passthrough { output: PathBuf },
    /// Deleted as a duplicate of `canonical`
    DeletedDuplicate { canonical: PathBuf },
    /// Would be deleted as a duplicate, but this is a dry run
    WouldDelete { canonical: PathBuf },
}

/// Why a file was left alone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Name is on the ignore list
    Ignored,
    /// Extension is not allow-listed
    ExtensionNotAllowed,
    /// Something is already archived at the destination
    DestinationExists { destination: PathBuf },
    /// Converted output is already present
    OutputExists { output: PathBuf },
    /// An in-place file already has the target codec
    AlreadyNormalized,
    /// Duration differs from the canonical file by more than the tolerance
    NearMiss { canonical: PathBuf, delta_seconds: f64 },
    /// Duration could not be probed
    UnknownDuration,
    /// Modified too recently; left for a later run
    Unstable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Ignored => write!(f, "name is ignored"),
            SkipReason::ExtensionNotAllowed => write!(f, "extension not allowed"),
            SkipReason::DestinationExists { destination } => {
                write!(f, "destination exists: {}", destination.display())
            }
            SkipReason::OutputExists { output } => {
                write!(f, "output exists: {}", output.display())
            }
            SkipReason::AlreadyNormalized => write!(f, "already normalized"),
            SkipReason::NearMiss {
                canonical,
                delta_seconds,
            } => write!(
                f,
                "duration differs from {} by {:.2}s",
                canonical.display(),
                delta_seconds
            ),
            SkipReason::UnknownDuration => write!(f, "duration unknown"),
            SkipReason::Unstable => write!(f, "still being written"),
        }
    }
}

/// What happened to a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Done(Action),
    Skipped(SkipReason),
    Failed { reason: String },
}

/// Outcome for a single file, with any partial-success warnings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: Outcome,
    /// Sub-failures that did not undo the main result
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl FileOutcome {
    pub fn done(path: impl AsRef<Path>, action: Action) -> Self {
        Self::new(path, Outcome::Done(action))
    }

    pub fn skipped(path: impl AsRef<Path>, reason: SkipReason) -> Self {
        Self::new(path, Outcome::Skipped(reason))
    }

    pub fn failed(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::new(
            path,
            Outcome::Failed {
                reason: reason.to_string(),
            },
        )
    }

    fn new(path: impl AsRef<Path>, outcome: Outcome) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            outcome,
            warnings: Vec::new(),
        }
    }

    /// Attach a warning
    pub fn with_warning(mut self, warning: impl ToString) -> Self {
        self.warnings.push(warning.to_string());
        self
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, Outcome::Done(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Outcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// Tally of outcomes in a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn tally(outcomes: &[FileOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut counts, o| {
            match o.outcome {
                Outcome::Done(_) => counts.done += 1,
                Outcome::Skipped(_) => counts.skipped += 1,
                Outcome::Failed { .. } => counts.failed += 1,
            }
            counts
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_each_kind() {
        let outcomes = vec![
            FileOutcome::done(
                "/a.jpg",
                Action::Moved {
                    destination: PathBuf::from("/archive/2024/2024-01/a.jpg"),
                },
            ),
            FileOutcome::skipped("/b.jpg", SkipReason::Ignored),
            FileOutcome::skipped("/c.txt", SkipReason::ExtensionNotAllowed),
            FileOutcome::failed("/d.jpg", "disk full"),
        ];

        let counts = OutcomeCounts::tally(&outcomes);
        assert_eq!(counts.done, 1);
        assert_eq!(counts.skipped, 2);
        assert_eq!(counts.failed, 1);
    }

    #[test]
    fn outcomes_serialize_with_tags() {
        let outcome = FileOutcome::skipped(
            "/inbox/clip.mov",
            SkipReason::NearMiss {
                canonical: PathBuf::from("/inbox/clip.mp4"),
                delta_seconds: 4.6,
            },
        );
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"outcome\":\"skipped\""));
        assert!(json.contains("\"reason\":\"near_miss\""));
        assert!(!json.contains("warnings"));
    }

    #[test]
    fn near_miss_display_shows_delta() {
        let reason = SkipReason::NearMiss {
            canonical: PathBuf::from("/inbox/clip.mp4"),
            delta_seconds: 4.6,
        };
        assert!(reason.to_string().contains("4.60s"));
    }
}
