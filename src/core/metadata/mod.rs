//! # Metadata Module
//!
//! Resolves the filing date of a media file.
//!
//! ## Precedence
//! Embedded dates are tried in this order, first non-empty wins:
//! 1. Capture time (`DateTimeOriginal`)
//! 2. Digitized time (`DateTimeDigitized`)
//! 3. Image modify time (`DateTime`)
//! 4. Container create time (video `creation_time` tag, via the prober)
//!
//! Without any of them the filesystem birth time is used. Unreadable
//! metadata is never an error for the caller; it becomes a warning.

use crate::core::probe::MediaProber;
use crate::core::scanner::{local_naive, FileStats};
use crate::error::MetadataError;
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Provenance of a filing date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Metadata,
    Filesystem,
}

/// Which embedded field supplied a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    Capture,
    Digitized,
    Modified,
    Created,
}

/// Dates found inside a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedDates {
    pub capture: Option<NaiveDateTime>,
    pub digitized: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub created: Option<NaiveDateTime>,
}

impl EmbeddedDates {
    /// The highest-precedence date present
    pub fn best(&self) -> Option<(DateField, NaiveDateTime)> {
        [
            (DateField::Capture, self.capture),
            (DateField::Digitized, self.digitized),
            (DateField::Modified, self.modified),
            (DateField::Created, self.created),
        ]
        .into_iter()
        .find_map(|(field, date)| date.map(|d| (field, d)))
    }

    pub fn is_empty(&self) -> bool {
        self.best().is_none()
    }
}

/// Outcome of resolving a filing date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateResolution {
    pub date: NaiveDateTime,
    pub source: DateSource,
    /// Set when `source` is [`DateSource::Metadata`]
    pub field: Option<DateField>,
    pub warnings: Vec<String>,
}

/// Resolves filing dates with the metadata fallback chain
#[derive(Clone, Default)]
pub struct MetadataResolver {
    container_dates: Option<Arc<dyn MediaProber>>,
}

impl std::fmt::Debug for MetadataResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataResolver")
            .field("container_dates", &self.container_dates.is_some())
            .finish()
    }
}

impl MetadataResolver {
    /// EXIF only
    pub fn new() -> Self {
        Self::default()
    }

    /// Also ask the prober for container creation times
    pub fn with_container_dates(mut self, prober: Arc<dyn MediaProber>) -> Self {
        self.container_dates = Some(prober);
        self
    }

    /// Resolve the filing date for `path`. Never fails.
    pub fn resolve(&self, path: &Path, stats: &FileStats) -> DateResolution {
        let mut warnings = Vec::new();

        let mut dates = match read_exif_dates(path) {
            Ok(dates) => dates,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No EXIF dates");
                warnings.push(e.to_string());
                EmbeddedDates::default()
            }
        };

        if dates.is_empty() {
            if let Some(prober) = &self.container_dates {
                dates.created = prober.creation_time(path);
            }
        }

        match dates.best() {
            Some((field, date)) => DateResolution {
                date,
                source: DateSource::Metadata,
                field: Some(field),
                // The container date rescued the lookup; the EXIF miss is
                // not worth reporting.
                warnings: Vec::new(),
            },
            None => {
                if warnings.is_empty() {
                    warnings.push(format!(
                        "No embedded date in {}; using filesystem time",
                        path.display()
                    ));
                }
                DateResolution {
                    date: local_naive(stats.times.created),
                    source: DateSource::Filesystem,
                    field: None,
                    warnings,
                }
            }
        }
    }
}

/// Read the EXIF date fields of a file
pub fn read_exif_dates(path: &Path) -> Result<EmbeddedDates, MetadataError> {
    let file = File::open(path).map_err(|source| MetadataError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut bufreader = BufReader::new(&file);
    let exif = Reader::new()
        .read_from_container(&mut bufreader)
        .map_err(|e| MetadataError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let field_date = |tag: Tag| {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|field| ascii_value(&field.value))
            .and_then(|s| parse_exif_datetime(&s))
    };

    Ok(EmbeddedDates {
        capture: field_date(Tag::DateTimeOriginal),
        digitized: field_date(Tag::DateTimeDigitized),
        modified: field_date(Tag::DateTime),
        created: None,
    })
}

/// Helper to extract string from EXIF ASCII value
fn ascii_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

/// Parse an EXIF timestamp ("YYYY:MM:DD HH:MM:SS").
///
/// Cameras with unset clocks write all zeros; that counts as empty.
pub fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim_matches('"').trim();
    ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y:%m:%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timestamps::FileTimes;
    use chrono::NaiveDate;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn stats_created_at(secs: u64) -> FileStats {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        FileStats {
            size: 4,
            times: FileTimes {
                created: time,
                modified: time,
                accessed: time,
                has_birth_time: true,
            },
        }
    }

    struct FixedCreation(Option<NaiveDateTime>);

    impl MediaProber for FixedCreation {
        fn video_codec(&self, _path: &Path) -> Option<String> {
            None
        }

        fn duration(&self, _path: &Path) -> Option<f64> {
            None
        }

        fn creation_time(&self, _path: &Path) -> Option<NaiveDateTime> {
            self.0
        }
    }

    #[test]
    fn best_follows_precedence() {
        let dates = EmbeddedDates {
            capture: None,
            digitized: Some(date(2021, 5, 1)),
            modified: Some(date(2022, 1, 1)),
            created: Some(date(2023, 1, 1)),
        };
        assert_eq!(dates.best(), Some((DateField::Digitized, date(2021, 5, 1))));

        let with_capture = EmbeddedDates {
            capture: Some(date(2020, 2, 2)),
            ..dates
        };
        assert_eq!(
            with_capture.best(),
            Some((DateField::Capture, date(2020, 2, 2)))
        );
    }

    #[test]
    fn parse_exif_datetime_formats() {
        assert_eq!(
            parse_exif_datetime("2024:01:15 12:00:00"),
            Some(date(2024, 1, 15))
        );
        assert_eq!(
            parse_exif_datetime("\"2024-01-15 12:00:00\""),
            Some(date(2024, 1, 15))
        );
        assert_eq!(parse_exif_datetime("0000:00:00 00:00:00"), None);
        assert_eq!(parse_exif_datetime(""), None);
    }

    #[test]
    fn unreadable_metadata_falls_back_to_filesystem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not_an_image.jpg");
        std::fs::write(&path, b"junk").unwrap();
        let stats = stats_created_at(1_650_000_000);

        let resolution = MetadataResolver::new().resolve(&path, &stats);

        assert_eq!(resolution.source, DateSource::Filesystem);
        assert_eq!(resolution.date, local_naive(stats.times.created));
        assert_eq!(resolution.field, None);
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[test]
    fn missing_file_falls_back_without_panicking() {
        let stats = stats_created_at(0);
        let resolution =
            MetadataResolver::new().resolve(Path::new("/nonexistent/file.jpg"), &stats);
        assert_eq!(resolution.source, DateSource::Filesystem);
    }

    #[test]
    fn container_creation_time_is_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mov");
        std::fs::write(&path, b"not exif").unwrap();

        let resolver = MetadataResolver::new()
            .with_container_dates(Arc::new(FixedCreation(Some(date(2019, 7, 4)))));
        let resolution = resolver.resolve(&path, &stats_created_at(0));

        assert_eq!(resolution.source, DateSource::Metadata);
        assert_eq!(resolution.field, Some(DateField::Created));
        assert_eq!(resolution.date, date(2019, 7, 4));
        assert!(resolution.warnings.is_empty());
    }

    /// A minimal big-endian JPEG whose Exif IFD carries only
    /// DateTimeOriginal (`YYYY:MM:DD HH:MM:SS`)
    fn jpeg_with_capture_date(datetime: &str) -> Vec<u8> {
        assert_eq!(datetime.len(), 19);
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM\x00\x2a");
        tiff.extend_from_slice(&8u32.to_be_bytes());
        // IFD0: one entry pointing at the Exif IFD
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x8769u16.to_be_bytes());
        tiff.extend_from_slice(&4u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&26u32.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes());
        // Exif IFD: DateTimeOriginal as ASCII stored at offset 44
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x9003u16.to_be_bytes());
        tiff.extend_from_slice(&2u16.to_be_bytes());
        tiff.extend_from_slice(&20u32.to_be_bytes());
        tiff.extend_from_slice(&44u32.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(tiff.len(), 44);
        tiff.extend_from_slice(datetime.as_bytes());
        tiff.push(0);

        let mut app1 = b"Exif\x00\x00".to_vec();
        app1.extend_from_slice(&tiff);

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
        jpeg.extend_from_slice(&app1);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn exif_capture_date_is_read_from_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IMG_0001.jpg");
        std::fs::write(&path, jpeg_with_capture_date("2019:07:04 12:00:00")).unwrap();

        let dates = read_exif_dates(&path).unwrap();
        assert_eq!(dates.capture, Some(date(2019, 7, 4)));
        assert_eq!(dates.digitized, None);

        // The file's own times point elsewhere; the embedded date wins
        let resolution = MetadataResolver::new().resolve(&path, &stats_created_at(1_650_000_000));
        assert_eq!(resolution.source, DateSource::Metadata);
        assert_eq!(resolution.field, Some(DateField::Capture));
        assert_eq!(resolution.date, date(2019, 7, 4));
        assert!(resolution.warnings.is_empty());
    }
}
