//! Capturing and restoring file timestamps.
//!
//! Copies and re-encodes produce files stamped "now"; the archive is ordered
//! by date, so outputs get their source's times written back.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Timestamps as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTimes {
    /// Birth time, or the modification time where the platform has none
    pub created: SystemTime,
    pub modified: SystemTime,
    pub accessed: SystemTime,
    /// False when `created` is a stand-in for the modification time
    pub has_birth_time: bool,
}

impl FileTimes {
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let accessed = metadata.accessed().unwrap_or(modified);
        let (created, has_birth_time) = match metadata.created() {
            Ok(created) => (created, true),
            Err(_) => (modified, false),
        };

        Self {
            created,
            modified,
            accessed,
            has_birth_time,
        }
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        fs::metadata(path).map(|m| Self::from_metadata(&m))
    }

    /// Write access and modification times onto `path`.
    ///
    /// Birth time cannot be set portably and is left to the filesystem.
    pub fn apply_to(&self, path: &Path) -> io::Result<()> {
        let accessed = filetime::FileTime::from_system_time(self.accessed);
        let modified = filetime::FileTime::from_system_time(self.modified);
        filetime::set_file_times(path, accessed, modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn apply_restores_modified_time() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("original.jpg");
        let copy = dir.path().join("copy.jpg");
        fs::write(&original, b"data").unwrap();
        fs::write(&copy, b"data").unwrap();

        let past = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        filetime::set_file_mtime(&original, filetime::FileTime::from_system_time(past)).unwrap();

        let times = FileTimes::read(&original).unwrap();
        times.apply_to(&copy).unwrap();

        let restored = fs::metadata(&copy).unwrap().modified().unwrap();
        assert_eq!(restored, past);
    }

    #[test]
    fn read_missing_file_is_error() {
        assert!(FileTimes::read(Path::new("/nonexistent/file.jpg")).is_err());
    }
}
