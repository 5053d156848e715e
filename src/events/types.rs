//! Event type definitions for status reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the archiver while it works
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Discovery events
    Scan(ScanEvent),
    /// Filing pass events
    Filing(FilingEvent),
    /// Normalization pass events
    Convert(ConvertEvent),
    /// Duplicate detection events
    Dedup(DedupEvent),
    /// Run-level events
    Run(RunEvent),
}

/// Events during discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Discovery has started under a root
    Started { root: PathBuf },
    /// A file was skipped because it could not be read
    Error { path: PathBuf, message: String },
    /// Discovery completed
    Completed { total_files: usize },
}

/// Events during the filing pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FilingEvent {
    /// Filing has started
    Started { total_files: usize },
    /// A file finished (moved, skipped or failed)
    FileDone {
        completed: usize,
        total: usize,
        path: PathBuf,
    },
    /// Filing completed
    Completed { moved: usize, skipped: usize, failed: usize },
}

/// Events during the normalization pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConvertEvent {
    /// Normalization has started
    Started { total_files: usize },
    /// The encoder started on a file
    FileStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    /// Encoder progress for the current file
    Progress(EncodeProgress),
    /// The current file finished
    FileDone { path: PathBuf },
    /// Normalization completed
    Completed { converted: usize, failed: usize },
}

/// Progress of a single encode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodeProgress {
    /// File being encoded
    pub path: PathBuf,
    /// Percentage complete (0-100), if the duration is known
    pub percent: Option<f64>,
    /// Estimated seconds remaining, if it can be derived
    pub eta_seconds: Option<f64>,
    /// Encoder reported speed multiplier (e.g. 1.5 for "1.5x")
    pub speed: Option<f64>,
}

/// Events during duplicate detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DedupEvent {
    /// Detection has started
    Started { groups: usize },
    /// A group was examined
    GroupChecked { completed: usize, total: usize },
    /// Detection completed
    Completed { duplicates: usize, near_misses: usize },
}

/// Run-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// A run has started
    Started { run_id: String },
    /// Moving to a new stage
    StageChanged { stage: RunStage },
    /// Filing was skipped because the source is not settled yet
    FilingDeferred { unstable: usize, unconverted: usize },
    /// A run completed
    Completed { run_id: String, duration_ms: u64 },
}

/// Stages of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStage {
    Normalizing,
    Verifying,
    Filing,
    Pruning,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStage::Normalizing => write!(f, "Normalizing"),
            RunStage::Verifying => write!(f, "Verifying"),
            RunStage::Filing => write!(f, "Filing"),
            RunStage::Pruning => write!(f, "Pruning"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_events_are_serializable() {
        let event = Event::Convert(ConvertEvent::Progress(EncodeProgress {
            path: PathBuf::from("/inbox/clip.mov"),
            percent: Some(42.5),
            eta_seconds: Some(12.0),
            speed: Some(2.0),
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Convert(ConvertEvent::Progress(p)) => {
                assert_eq!(p.percent, Some(42.5));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn run_stage_displays_name() {
        assert_eq!(RunStage::Filing.to_string(), "Filing");
    }
}
