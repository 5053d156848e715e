//! Directory walking implementation using walkdir.

use super::{filter::MediaFilter, FileStats, FilterDecision, MediaFile};
use crate::core::metadata::MetadataResolver;
use crate::core::timestamps::FileTimes;
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Configuration for discovery
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Extensions to keep (case-insensitive); `None` keeps every file
    pub extensions: Option<Vec<String>>,
    /// File names dropped after enumeration
    pub ignore_names: Vec<String>,
    /// Whether hidden files are returned
    pub include_hidden: bool,
}

impl DiscoveryOptions {
    /// Every file, hidden ones included; used by the filing pass
    pub fn all_files(ignore_names: &[String]) -> Self {
        Self {
            extensions: None,
            ignore_names: ignore_names.to_vec(),
            include_hidden: true,
        }
    }

    /// Extension-scoped discovery; used by the video passes
    pub fn videos<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            extensions: Some(extensions.iter().map(|e| e.as_ref().to_string()).collect()),
            ignore_names: Vec::new(),
            include_hidden: false,
        }
    }

    pub fn ignoring(mut self, names: &[String]) -> Self {
        self.ignore_names = names.to_vec();
        self
    }
}

/// Result of a discovery pass
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Discovered files, sorted by path
    pub files: Vec<MediaFile>,
    /// Files that could not be read (non-fatal)
    pub errors: Vec<ScanError>,
    /// Metadata fallbacks and other notes
    pub warnings: Vec<String>,
}

/// Discovery implementation using the walkdir crate
pub struct WalkDirScanner {
    filter: MediaFilter,
    resolver: Option<MetadataResolver>,
}

impl WalkDirScanner {
    pub fn new(options: DiscoveryOptions) -> Self {
        let mut filter = MediaFilter::new()
            .with_hidden(options.include_hidden)
            .with_ignore_names(options.ignore_names);

        if let Some(extensions) = options.extensions {
            filter = filter.with_extensions(extensions);
        }

        Self {
            filter,
            resolver: None,
        }
    }

    /// Attach filing dates to every discovered file
    pub fn with_resolver(mut self, resolver: MetadataResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Walk `root` and collect matching regular files.
    ///
    /// Fails only when the root itself cannot be enumerated; unreadable
    /// entries below it are recorded in [`ScanResult::errors`].
    pub fn discover(&self, root: &Path, events: &EventSender) -> Result<ScanResult, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        if let Err(e) = fs::read_dir(root) {
            return Err(root_error(root, e));
        }

        events.send(Event::Scan(ScanEvent::Started {
            root: root.to_path_buf(),
        }));

        let mut result = ScanResult::default();

        for entry_result in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    if e.depth() == 0 {
                        let io = e
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("walk failed at root"));
                        return Err(root_error(root, io));
                    }
                    warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    events.send(Event::Scan(ScanEvent::Error {
                        path: path.clone(),
                        message: e.to_string(),
                    }));
                    result.errors.push(ScanError::ReadEntry {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    });
                    continue;
                }
            };

            // Regular files only: directories are recursed, links and
            // special files are dropped.
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            match self.filter.classify(path) {
                FilterDecision::Include => {}
                decision => {
                    debug!(path = %path.display(), ?decision, "Filtered out");
                    continue;
                }
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping file without stats");
                    events.send(Event::Scan(ScanEvent::Error {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    }));
                    result.errors.push(ScanError::ReadEntry {
                        path: path.to_path_buf(),
                        source: std::io::Error::other(e.to_string()),
                    });
                    continue;
                }
            };

            let stats = FileStats {
                size: metadata.len(),
                times: FileTimes::from_metadata(&metadata),
            };
            let mut file = MediaFile::new(path.to_path_buf(), stats);

            if let Some(resolver) = &self.resolver {
                let resolution = resolver.resolve(&file.path, &file.stats);
                result.warnings.extend(resolution.warnings.iter().cloned());
                file = file.with_resolution(&resolution);
            }

            result.files.push(file);
        }

        events.send(Event::Scan(ScanEvent::Completed {
            total_files: result.files.len(),
        }));

        Ok(result)
    }
}

fn root_error(root: &Path, error: std::io::Error) -> ScanError {
    match error.kind() {
        ErrorKind::PermissionDenied => ScanError::PermissionDenied {
            path: root.to_path_buf(),
        },
        ErrorKind::NotFound => ScanError::DirectoryNotFound {
            path: root.to_path_buf(),
        },
        _ => ScanError::ReadEntry {
            path: root.to_path_buf(),
            source: error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::DateSource;
    use crate::events::null_sender;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(&path).unwrap();
        file.write_all(b"media").unwrap();
        path
    }

    fn names(result: &ScanResult) -> Vec<String> {
        result.files.iter().map(|f| f.name.clone()).collect()
    }

    #[test]
    fn discover_empty_directory_returns_empty_vec() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = WalkDirScanner::new(DiscoveryOptions::default());

        let result = scanner.discover(temp_dir.path(), &null_sender()).unwrap();

        assert!(result.files.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn all_files_includes_hidden_and_nested() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.jpg");
        touch(temp_dir.path(), ".hidden.jpg");
        touch(temp_dir.path(), "nested/deeper/b.txt");

        let scanner = WalkDirScanner::new(DiscoveryOptions::all_files(&[]));
        let result = scanner.discover(temp_dir.path(), &null_sender()).unwrap();

        assert_eq!(result.files.len(), 3);
        assert!(names(&result).contains(&".hidden.jpg".to_string()));
    }

    #[test]
    fn ignored_names_are_dropped() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.jpg");
        touch(temp_dir.path(), ".DS_Store");

        let scanner = WalkDirScanner::new(DiscoveryOptions::all_files(&[".DS_Store".to_string()]));
        let result = scanner.discover(temp_dir.path(), &null_sender()).unwrap();

        assert_eq!(names(&result), vec!["a.jpg".to_string()]);
    }

    #[test]
    fn video_discovery_is_extension_scoped() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "clip.MOV");
        touch(temp_dir.path(), "clip.mp4");
        touch(temp_dir.path(), "photo.jpg");
        touch(temp_dir.path(), ".clip.x1y2.partial.mp4");

        let scanner = WalkDirScanner::new(DiscoveryOptions::videos(&["mp4", "mov"]));
        let result = scanner.discover(temp_dir.path(), &null_sender()).unwrap();

        assert_eq!(result.files.len(), 2);
        assert!(result.files.iter().all(|f| f.extension == "mp4" || f.extension == "mov"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let target = touch(temp_dir.path(), "real.jpg");
        std::os::unix::fs::symlink(&target, temp_dir.path().join("link.jpg")).unwrap();

        let scanner = WalkDirScanner::new(DiscoveryOptions::all_files(&[]));
        let result = scanner.discover(temp_dir.path(), &null_sender()).unwrap();

        assert_eq!(names(&result), vec!["real.jpg".to_string()]);
    }

    #[test]
    fn resolver_attaches_filing_dates() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "not_really.jpg");

        let scanner = WalkDirScanner::new(DiscoveryOptions::all_files(&[]))
            .with_resolver(MetadataResolver::new());
        let result = scanner.discover(temp_dir.path(), &null_sender()).unwrap();

        assert_eq!(result.files[0].filing_date_source, DateSource::Filesystem);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn discover_nonexistent_root_is_fatal() {
        let scanner = WalkDirScanner::new(DiscoveryOptions::default());
        let result = scanner.discover(Path::new("/nonexistent/path/12345"), &null_sender());

        assert!(matches!(result, Err(ScanError::DirectoryNotFound { .. })));
    }
}
