//! # Probe Module
//!
//! Read-only queries against video files: codec of the first video stream,
//! container duration and container creation time.
//!
//! Every query answers `None` for "unknown" instead of failing; corrupt and
//! unsupported files are common and each caller has its own fallback.

mod ffprobe;

pub use ffprobe::FfprobeProber;
pub(crate) use ffprobe::ensure_tool;

use chrono::NaiveDateTime;
use std::path::Path;

/// Trait for media probers
///
/// Implement this trait to substitute the external prober (e.g., for testing).
pub trait MediaProber: Send + Sync {
    /// Codec name of the first video stream (e.g. `h264`)
    fn video_codec(&self, path: &Path) -> Option<String>;

    /// Container duration in seconds
    fn duration(&self, path: &Path) -> Option<f64>;

    /// Container creation time, in local wall-clock time
    fn creation_time(&self, _path: &Path) -> Option<NaiveDateTime> {
        None
    }
}
