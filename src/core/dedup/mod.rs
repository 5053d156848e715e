//! # Dedup Module
//!
//! Removes pre-conversion originals that sit next to their normalized copy.
//!
//! Videos are grouped by directory and base name. A group with exactly one
//! `.mp4` and at least one other member is checked: members whose duration
//! is within one second of the `.mp4` are duplicates, the rest are near
//! misses and stay.

mod detector;
mod grouper;

pub use detector::{DedupConfig, DedupReport, DuplicateDetector, DURATION_TOLERANCE_SECS};
pub use grouper::{group_siblings, DuplicateGroup, GroupKey};
