//! # media-archive CLI
//!
//! Command-line interface for the media archiver.
//!
//! ## Usage
//! ```bash
//! media-archive run ~/Inbox ~/Archive --normalize-videos
//! media-archive run ~/Inbox ~/Archive --watch --interval 120
//! media-archive dedup ~/Inbox --dry-run --output json
//! ```

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
