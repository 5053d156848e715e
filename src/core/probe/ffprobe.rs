//! Prober backed by the `ffprobe` binary.

use super::MediaProber;
use crate::error::{ArchiveError, ProbeError};
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Runs `ffprobe` once per query and reads a single plain-text token
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Fail unless the binary runs
    pub fn ensure_available(&self) -> Result<(), ArchiveError> {
        ensure_tool(&self.binary)
    }

    /// Codec of the first video stream
    pub fn try_video_codec(&self, path: &Path) -> Result<String, ProbeError> {
        let token = self.query(
            path,
            &["-select_streams", "v:0", "-show_entries", "stream=codec_name"],
        )?;
        Ok(token.to_lowercase())
    }

    /// Container duration in seconds
    pub fn try_duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let token = self.query(path, &["-show_entries", "format=duration"])?;
        parse_duration(&token).ok_or_else(|| ProbeError::Unparseable {
            tool: self.tool_name(),
            path: path.to_path_buf(),
            output: token,
        })
    }

    /// Container `creation_time` tag
    pub fn try_creation_time(&self, path: &Path) -> Result<NaiveDateTime, ProbeError> {
        let token = self.query(path, &["-show_entries", "format_tags=creation_time"])?;
        parse_creation_time(&token).ok_or_else(|| ProbeError::Unparseable {
            tool: self.tool_name(),
            path: path.to_path_buf(),
            output: token,
        })
    }

    fn query(&self, path: &Path, entries: &[&str]) -> Result<String, ProbeError> {
        let output = Command::new(&self.binary)
            .args(["-v", "error"])
            .args(entries)
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path)
            .output()
            .map_err(|source| ProbeError::Spawn {
                tool: self.tool_name(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                tool: self.tool_name(),
                path: path.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(first_token(&stdout).unwrap_or_default().to_string())
    }

    fn tool_name(&self) -> String {
        self.binary.display().to_string()
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProber for FfprobeProber {
    fn video_codec(&self, path: &Path) -> Option<String> {
        match self.try_video_codec(path) {
            Ok(codec) if !codec.is_empty() => Some(codec),
            Ok(_) => {
                debug!(path = %path.display(), "No video stream");
                None
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Codec unknown");
                None
            }
        }
    }

    fn duration(&self, path: &Path) -> Option<f64> {
        self.try_duration(path)
            .map_err(|e| debug!(path = %path.display(), error = %e, "Duration unknown"))
            .ok()
    }

    fn creation_time(&self, path: &Path) -> Option<NaiveDateTime> {
        self.try_creation_time(path).ok()
    }
}

/// Check that an external tool can be executed (`<tool> -version`)
pub(crate) fn ensure_tool(binary: &Path) -> Result<(), ArchiveError> {
    let runs = Command::new(binary)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);

    if runs {
        Ok(())
    } else {
        Err(ArchiveError::MissingTool {
            tool: binary.display().to_string(),
        })
    }
}

fn first_token(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Parse a duration token; `N/A` and negatives are unknown
pub(crate) fn parse_duration(token: &str) -> Option<f64> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Parse an ISO-8601 creation time into local wall-clock time
pub(crate) fn parse_creation_time(token: &str) -> Option<NaiveDateTime> {
    let token = token.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    NaiveDateTime::parse_from_str(token, "%Y-%m-%d %H:%M:%S").ok()
}
