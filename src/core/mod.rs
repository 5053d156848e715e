//! # Core Module
//!
//! The archiving engine, independent of any front end.
//!
//! ## Modules
//! - `scanner` - Discovers files under a root
//! - `metadata` - Resolves filing dates from embedded metadata
//! - `filing` - Plans archive destinations and moves files there
//! - `probe` - Queries codec, duration and creation time of videos
//! - `convert` - Normalizes videos to H.264/MP4
//! - `stability` - Detects files that are still being written
//! - `dedup` - Removes originals that duplicate a normalized copy
//! - `pipeline` - Orchestrates single and continuous runs

pub mod cancel;
pub mod convert;
pub mod dedup;
pub mod filing;
pub mod metadata;
pub mod outcome;
pub mod pipeline;
pub mod probe;
pub mod scanner;
pub mod stability;
pub mod timestamps;

// Re-export commonly used types
pub use cancel::CancelFlag;
pub use outcome::{Action, FileOutcome, Outcome, OutcomeCounts, SkipReason};
pub use pipeline::{Orchestrator, RunReport};
pub use scanner::MediaFile;
