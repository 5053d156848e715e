//! # Pipeline Module
//!
//! Orchestrates a full archive run.
//!
//! ## Run Stages
//! 1. **Normalize** - Convert videos to the target format (optional)
//! 2. **Verify** - Defer filing while uploads or conversions are pending
//! 3. **File** - Move everything into the dated archive
//! 4. **Prune** - Remove emptied source directories (single-run mode only)
//!
//! ## Scheduling
//! Files are processed one at a time. Continuous mode repeats runs on a
//! fixed interval that starts only after the previous run finished.

mod orchestrator;
mod prune;
mod report;

pub use orchestrator::Orchestrator;
pub use prune::prune_empty_dirs;
pub use report::{FilingDeferral, RunReport, RunSummary};
