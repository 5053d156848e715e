//! The external encoder.
//!
//! [`VideoEncoder`] is the seam between the normalization engine and the
//! `ffmpeg` process. The engine owns output placement; an encoder only
//! writes the file it is told to write.

use super::progress::{ProgressSample, ProgressStream};
use crate::core::cancel::CancelFlag;
use crate::core::probe::ensure_tool;
use crate::error::{ArchiveError, ConvertError};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// How much of the stderr tail is kept for error reports
const STDERR_TAIL_BYTES: usize = 4096;

/// Which audio streams to carry over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioStreams {
    /// First audio stream only
    FirstOnly,
    /// Every audio stream
    All,
}

/// Fixed quality parameters for every encode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// x264 constant rate factor; 18 is visually lossless
    pub crf: u8,
    pub preset: String,
    pub audio_bitrate: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            crf: 18,
            preset: "medium".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

/// One encode
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input: PathBuf,
    /// Where the encoder writes; normally a hidden partial file
    pub output: PathBuf,
    pub audio: AudioStreams,
}

/// Trait for video encoders
///
/// Implement this trait to substitute the external encoder (e.g., for testing).
pub trait VideoEncoder: Send + Sync {
    /// Encode `request.input` to `request.output`, reporting each progress
    /// sample. Must return [`ConvertError::Cancelled`] promptly once `cancel`
    /// is set.
    fn encode(
        &self,
        request: &EncodeRequest,
        on_progress: &mut dyn FnMut(ProgressSample),
        cancel: &CancelFlag,
    ) -> Result<(), ConvertError>;
}

/// Encoder backed by the `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: PathBuf,
    settings: EncoderSettings,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<PathBuf>, settings: EncoderSettings) -> Self {
        Self {
            binary: binary.into(),
            settings,
        }
    }

    /// Fail unless the binary runs
    pub fn ensure_available(&self) -> Result<(), ArchiveError> {
        ensure_tool(&self.binary)
    }

    /// Full argument list for one encode
    pub fn arguments(&self, request: &EncodeRequest) -> Vec<String> {
        let audio_map = match request.audio {
            AudioStreams::FirstOnly => "0:a:0?",
            AudioStreams::All => "0:a?",
        };

        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-v", "error", "-y", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(path_arg(&request.input));
        let crf = self.settings.crf.to_string();
        args.extend(
            [
                "-map", "0:v:0", "-map", audio_map,
                "-c:v", "libx264",
                "-preset", self.settings.preset.as_str(),
                "-crf", crf.as_str(),
                "-c:a", "aac",
                "-b:a", self.settings.audio_bitrate.as_str(),
                "-map_metadata", "0",
                "-movflags", "+faststart+use_metadata_tags",
                "-progress", "pipe:1",
                "-nostats",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(path_arg(&request.output));
        args
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg", EncoderSettings::default())
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(
        &self,
        request: &EncodeRequest,
        on_progress: &mut dyn FnMut(ProgressSample),
        cancel: &CancelFlag,
    ) -> Result<(), ConvertError> {
        let input = request.input.clone();
        let output_err = |source| ConvertError::Output {
            path: input.clone(),
            source,
        };

        // stderr goes to an unnamed temp file so only one pipe needs draining
        let mut stderr_file = tempfile::tempfile().map_err(output_err)?;
        let stderr_handle = stderr_file.try_clone().map_err(output_err)?;

        debug!(args = ?self.arguments(request), "Starting encoder");
        let mut child = Command::new(&self.binary)
            .args(self.arguments(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr_handle))
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                path: request.input.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            for sample in ProgressStream::new(BufReader::new(stdout)) {
                if cancel.is_cancelled() {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ConvertError::Cancelled {
                        path: request.input.clone(),
                    });
                }
                match sample {
                    Ok(sample) => on_progress(sample),
                    Err(e) => {
                        debug!(error = %e, "Progress stream ended early");
                        break;
                    }
                }
            }
        }

        let status = child.wait().map_err(output_err)?;
        if cancel.is_cancelled() {
            return Err(ConvertError::Cancelled {
                path: request.input.clone(),
            });
        }
        if !status.success() {
            return Err(ConvertError::EncoderFailed {
                path: request.input.clone(),
                code: status.code(),
                stderr: read_tail(&mut stderr_file),
            });
        }

        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn read_tail(file: &mut std::fs::File) -> String {
    let mut buffer = Vec::new();
    if file.seek(SeekFrom::Start(0)).is_err() || file.read_to_end(&mut buffer).is_err() {
        return String::new();
    }
    let start = buffer.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&buffer[start..]).trim().to_string()
}
