//! # Filing Module
//!
//! Files media into a date-based archive layout: `{archive}/{YYYY}/{YYYY}-{MM}/{name}`.
//!
//! ## Features
//! - Pure destination planning from the resolved filing date
//! - Dry previews with per-year summaries and conflict detection
//! - Copy-verify-delete moves that never overwrite existing archive files
//! - Original timestamps carried over to the archived copy

mod mover;
mod planner;
mod types;

pub use mover::Mover;
pub use planner::FilingPlanner;
pub use types::*;
