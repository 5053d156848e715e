//! Run configuration.
//!
//! A [`RunConfig`] can be read from a JSON file and then overridden by
//! command-line flags. Every field has a default, so a config file only needs
//! the keys it changes.

use crate::core::convert::{AudioStreams, EncoderSettings, NormalizeConfig, TargetFormat};
use crate::core::dedup::DedupConfig;
use crate::core::stability::StabilityGate;
use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "media-archiver";
const CONFIG_FILE: &str = "config.json";

/// Options for one run (or a continuous series of runs)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Inbound collection
    pub source_root: PathBuf,
    /// Dated archive
    pub archive_root: PathBuf,
    /// Where normalized videos go; the source root when unset
    pub output_root: Option<PathBuf>,
    /// Repeat runs on a fixed interval
    pub continuous: bool,
    /// Seconds between the end of one run and the start of the next
    pub interval_secs: u64,
    pub normalize_videos: bool,
    pub delete_originals: bool,
    pub stop_on_error: bool,
    /// Report duplicate deletions without performing them
    pub dry_run: bool,
    pub stability_threshold_secs: u64,
    /// Compare content digests after each archive copy
    pub verify_checksum: bool,
    pub ignore_names: Vec<String>,
    pub video_extensions: Vec<String>,
    pub filing_extensions: Vec<String>,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub encoder: EncoderSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::new(),
            archive_root: PathBuf::new(),
            output_root: None,
            continuous: false,
            interval_secs: 60,
            normalize_videos: false,
            delete_originals: false,
            stop_on_error: false,
            dry_run: false,
            stability_threshold_secs: 5,
            verify_checksum: true,
            ignore_names: strings(&[".DS_Store", "Thumbs.db", "desktop.ini", ".localized"]),
            video_extensions: strings(VIDEO_EXTENSIONS),
            filing_extensions: strings(PHOTO_EXTENSIONS)
                .into_iter()
                .chain(strings(VIDEO_EXTENSIONS))
                .collect(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            encoder: EncoderSettings::default(),
        }
    }
}

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "avi", "mkv", "wmv", "3gp", "mts", "m2ts", "webm",
];

const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "heic", "heif", "dng", "cr2",
    "cr3", "nef", "arw", "orf", "rw2", "raf",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl RunConfig {
    /// `<config dir>/media-archiver/config.json`, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Read a config file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ArchiveError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| ArchiveError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Load `explicit` if given (it must exist), else the default file if
    /// present, else built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_json_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_json_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Fatal startup checks, run before any file is touched
    pub fn validate(&self) -> Result<()> {
        if self.source_root.as_os_str().is_empty() {
            return Err(ArchiveError::Config("source root is required".to_string()));
        }
        if !self.source_root.is_dir() {
            return Err(ArchiveError::Config(format!(
                "source root {} does not exist or is not a directory",
                self.source_root.display()
            )));
        }
        if self.archive_root.as_os_str().is_empty() {
            return Err(ArchiveError::Config("archive root is required".to_string()));
        }
        let source = absolute(&self.source_root);
        let archive = absolute(&self.archive_root);
        if archive.starts_with(&source) {
            return Err(ArchiveError::Config(format!(
                "archive root {} must not be inside source root {}",
                self.archive_root.display(),
                self.source_root.display()
            )));
        }
        if self.continuous && self.interval_secs == 0 {
            return Err(ArchiveError::Config("interval must be at least one second".to_string()));
        }
        if self.video_extensions.is_empty() {
            return Err(ArchiveError::Config("no video extensions configured".to_string()));
        }
        Ok(())
    }

    /// Checks for commands that only read the source tree
    pub fn validate_source(&self) -> Result<()> {
        if !self.source_root.is_dir() {
            return Err(ArchiveError::Config(format!(
                "source root {} does not exist or is not a directory",
                self.source_root.display()
            )));
        }
        Ok(())
    }

    pub fn output_root(&self) -> &Path {
        self.output_root.as_deref().unwrap_or(&self.source_root)
    }

    pub fn stability_gate(&self) -> StabilityGate {
        StabilityGate::new(Duration::from_secs(self.stability_threshold_secs))
    }

    pub fn normalize_config(&self, audio: AudioStreams) -> NormalizeConfig {
        NormalizeConfig {
            target: TargetFormat::default(),
            audio,
            delete_originals: self.delete_originals,
            stop_on_error: self.stop_on_error,
            stability: Some(self.stability_gate()),
        }
    }

    pub fn dedup_config(&self) -> DedupConfig {
        DedupConfig {
            dry_run: self.dry_run,
            stop_on_error: self.stop_on_error,
            ..DedupConfig::default()
        }
    }
}

/// Canonical form when the path exists, otherwise joined onto the current
/// directory's canonical form
fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };
    // Canonicalize the nearest existing ancestor
    let mut existing = joined.as_path();
    let mut rest = Vec::new();
    while let Some(parent) = existing.parent() {
        if let Some(name) = existing.file_name() {
            rest.push(name.to_os_string());
        }
        existing = parent;
        if let Ok(canonical) = existing.canonicalize() {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
    }
    joined
}
