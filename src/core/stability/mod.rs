//! # Stability Module
//!
//! Decides whether a file may still be receiving writes (e.g. mid-upload).
//! The check is instantaneous: it never waits or retries; callers defer the
//! batch to a later run instead.

use crate::core::scanner::MediaFile;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Default quiet period before a file counts as settled
pub const DEFAULT_STABILITY_THRESHOLD: Duration = Duration::from_secs(5);

/// A file is stable once it has not been modified for `threshold`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityGate {
    threshold: Duration,
}

impl StabilityGate {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Pure check against an explicit clock.
    ///
    /// A modification time in the future (clock skew, or a write that raced
    /// the stat) counts as unstable.
    pub fn is_stable_at(&self, modified: SystemTime, now: SystemTime) -> bool {
        match now.duration_since(modified) {
            Ok(age) => age >= self.threshold,
            Err(_) => false,
        }
    }

    /// Stat `path` and compare against the current time
    pub fn check(&self, path: &Path) -> io::Result<bool> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(self.is_stable_at(modified, SystemTime::now()))
    }

    /// Check a discovered file using its recorded stats
    pub fn is_file_stable(&self, file: &MediaFile) -> bool {
        self.is_stable_at(file.stats.times.modified, SystemTime::now())
    }
}

impl Default for StabilityGate {
    fn default() -> Self {
        Self::new(DEFAULT_STABILITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn recently_modified_file_is_unstable() {
        let gate = StabilityGate::default();
        let now = SystemTime::now();
        assert!(!gate.is_stable_at(now - Duration::from_secs(2), now));
    }

    #[test]
    fn quiet_file_is_stable() {
        let gate = StabilityGate::default();
        let now = SystemTime::now();
        assert!(gate.is_stable_at(now - Duration::from_secs(10), now));
    }

    #[test]
    fn threshold_boundary_is_stable() {
        let gate = StabilityGate::new(Duration::from_secs(5));
        let now = SystemTime::now();
        assert!(gate.is_stable_at(now - Duration::from_secs(5), now));
    }

    #[test]
    fn future_modification_is_unstable() {
        let gate = StabilityGate::default();
        let now = SystemTime::now();
        assert!(!gate.is_stable_at(now + Duration::from_secs(60), now));
    }

    #[test]
    fn check_reads_file_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.mov");
        fs::write(&path, b"partial").unwrap();

        let gate = StabilityGate::default();
        assert!(!gate.check(&path).unwrap());

        let old = SystemTime::now() - Duration::from_secs(60);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(old)).unwrap();
        assert!(gate.check(&path).unwrap());
    }

    #[test]
    fn check_missing_file_is_error() {
        let gate = StabilityGate::default();
        assert!(gate.check(Path::new("/nonexistent/upload.mov")).is_err());
    }
}
