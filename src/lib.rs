//! # Media Archiver
//!
//! Files photos and videos from an inbound folder into a dated archive,
//! normalizing videos on the way and removing originals that duplicate
//! their normalized copy.
//!
//! ## Core Philosophy
//! - **Never overwrite** - Existing archive files are always left alone
//! - **Never lose data** - Sources are removed only after a verified copy exists
//! - **Report everything** - Every skip, move, encode and delete is recorded per file
//!
//! ## Architecture
//! The library is split into a core engine and presentation layers:
//! - `core` - Discovery, filing, normalization and duplicate detection
//! - `config` - Run configuration
//! - `events` - Status channel for progress reporting
//! - `error` - Error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use config::RunConfig;
pub use error::{ArchiveError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. `RUST_LOG`
/// overrides the default level (`info`, or `debug` when `verbose`).
/// Calling it again is a no-op.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
