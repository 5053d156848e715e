//! The normalization pass.

use super::decision::{decide, ConversionAction, EncodeReason, TargetFormat};
use super::encoder::{AudioStreams, EncodeRequest, VideoEncoder};
use super::progress::estimate;
use crate::core::cancel::CancelFlag;
use crate::core::outcome::{Action, FileOutcome, Outcome, OutcomeCounts, SkipReason};
use crate::core::probe::MediaProber;
use crate::core::scanner::{is_partial_output, MediaFile, PARTIAL_SUFFIX};
use crate::core::stability::StabilityGate;
use crate::core::timestamps::FileTimes;
use crate::error::{ArchiveError, ConvertError};
use crate::events::{ConvertEvent, EncodeProgress, Event, EventSender};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Options for a normalization pass
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    pub target: TargetFormat,
    pub audio: AudioStreams,
    /// Remove the source once its output is in place
    pub delete_originals: bool,
    /// Abort the pass on the first failed file
    pub stop_on_error: bool,
    /// Skip files modified too recently
    pub stability: Option<StabilityGate>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target: TargetFormat::default(),
            audio: AudioStreams::All,
            delete_originals: false,
            stop_on_error: false,
            stability: None,
        }
    }
}

/// Everything known about one video before it is handled
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub input_path: PathBuf,
    /// Always has the target container extension
    pub output_path: PathBuf,
    pub detected_codec: Option<String>,
    pub duration_seconds: Option<f64>,
    pub original_times: FileTimes,
}

/// Result of a normalization pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub outcomes: Vec<FileOutcome>,
    pub duration_ms: u64,
}

impl NormalizeReport {
    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts::tally(&self.outcomes)
    }

    /// Files that went through the encoder
    pub fn encoded(&self) -> usize {
        self.count_actions(|a| matches!(a, Action::Encoded { .. }))
    }

    /// Files placed without re-encoding
    pub fn passed_through(&self) -> usize {
        self.count_actions(|a| matches!(a, Action::Passthrough { .. }))
    }

    fn count_actions(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(&o.outcome, Outcome::Done(a) if pred(a)))
            .count()
    }
}

/// Where the normalized copy of `input` goes: the relative directory under
/// `scan_root` mirrored under `output_root`, same stem, target extension.
///
/// An input already in the target container keeps its own spelling of the
/// extension, so `CLIP.MP4` maps to `CLIP.MP4` and is handled in place
/// instead of gaining a `CLIP.mp4` sibling.
pub fn mirrored_output_path(scan_root: &Path, output_root: &Path, input: &Path, container: &str) -> PathBuf {
    let relative_dir = input
        .strip_prefix(scan_root)
        .ok()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new(""));
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = match input.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(container) => ext,
        _ => container,
    };
    output_root
        .join(relative_dir)
        .join(format!("{}.{}", stem, extension))
}

/// Videos that still need converting: not in the target container and
/// their expected output does not exist yet
pub fn find_unconverted(
    files: &[MediaFile],
    scan_root: &Path,
    output_root: &Path,
    target: &TargetFormat,
) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|f| !target.is_target_container(&f.extension))
        .filter(|f| !mirrored_output_path(scan_root, output_root, &f.path, &target.container).exists())
        .map(|f| f.path.clone())
        .collect()
}

/// Delete partial outputs left behind by an interrupted process
pub fn sweep_partials(root: &Path) -> usize {
    let mut removed = 0;
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_partial_output(e.path()))
    {
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                info!(path = %entry.path().display(), "Removed stale partial output");
                removed += 1;
            }
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Could not remove partial output"),
        }
    }
    removed
}

/// Decides and performs the normalization of each video, one at a time
pub struct Normalizer {
    prober: Arc<dyn MediaProber>,
    encoder: Arc<dyn VideoEncoder>,
    config: NormalizeConfig,
    cancel: CancelFlag,
}

impl Normalizer {
    pub fn new(
        prober: Arc<dyn MediaProber>,
        encoder: Arc<dyn VideoEncoder>,
        config: NormalizeConfig,
    ) -> Self {
        Self {
            prober,
            encoder,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Share a cancellation flag with the caller
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Normalize `files`, writing outputs under `output_root` mirrored from
    /// `scan_root`.
    ///
    /// Per-file failures become outcomes. Returns `Err` only when cancelled,
    /// or on the first failure when `stop_on_error` is set.
    pub fn normalize(
        &self,
        scan_root: &Path,
        output_root: &Path,
        files: &[MediaFile],
        events: &EventSender,
    ) -> Result<NormalizeReport, ArchiveError> {
        let start = Instant::now();
        let total = files.len();
        let mut report = NormalizeReport::default();

        events.send(Event::Convert(ConvertEvent::Started { total_files: total }));

        for (index, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ArchiveError::Cancelled);
            }

            if let Some(gate) = &self.config.stability {
                if !gate.is_file_stable(file) {
                    info!(path = %file.path.display(), "Still being written, deferring");
                    report.outcomes.push(FileOutcome::skipped(&file.path, SkipReason::Unstable));
                    continue;
                }
            }

            let output = mirrored_output_path(scan_root, output_root, &file.path, &self.config.target.container);
            let outcome = match self.normalize_one(file, &output, index, total, events) {
                Ok(outcome) => outcome,
                Err(ConvertError::Cancelled { path }) => {
                    warn!(path = %path.display(), "Encode cancelled, partial output removed");
                    return Err(ArchiveError::Cancelled);
                }
                Err(e) => {
                    error!(path = %file.path.display(), error = %e, "Normalization failed");
                    if self.config.stop_on_error {
                        return Err(ArchiveError::Aborted {
                            path: file.path.clone(),
                            reason: e.to_string(),
                        });
                    }
                    FileOutcome::failed(&file.path, e)
                }
            };
            report.outcomes.push(outcome);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        events.send(Event::Convert(ConvertEvent::Completed {
            converted: report.encoded() + report.passed_through(),
            failed: report.counts().failed,
        }));
        Ok(report)
    }

    /// Handle one file whose output path is already known
    pub fn normalize_one(
        &self,
        file: &MediaFile,
        output: &Path,
        index: usize,
        total: usize,
        events: &EventSender,
    ) -> Result<FileOutcome, ConvertError> {
        let target = &self.config.target;
        let in_place = file.path == output;
        let output_exists = !in_place && output.exists();

        let codec = if !output_exists && target.is_target_container(&file.extension) {
            self.prober.video_codec(&file.path)
        } else {
            None
        };

        let action = decide(target, &file.path, output, codec.as_deref(), output_exists);
        debug!(path = %file.path.display(), ?action, codec = ?codec, "Decided");

        let job = ConversionJob {
            input_path: file.path.clone(),
            output_path: output.to_path_buf(),
            detected_codec: codec,
            duration_seconds: None,
            original_times: file.stats.times,
        };

        match action {
            ConversionAction::SkipOutputExists => {
                info!(path = %file.path.display(), output = %output.display(), "Output exists, skipping");
                Ok(FileOutcome::skipped(
                    &file.path,
                    SkipReason::OutputExists {
                        output: output.to_path_buf(),
                    },
                ))
            }
            ConversionAction::SkipAlreadyNormalized => {
                debug!(path = %file.path.display(), "Already normalized");
                Ok(FileOutcome::skipped(&file.path, SkipReason::AlreadyNormalized))
            }
            ConversionAction::Passthrough => self.pass_through(&job),
            ConversionAction::Encode(reason) => {
                let job = ConversionJob {
                    duration_seconds: self.prober.duration(&file.path),
                    ..job
                };
                events.send(Event::Convert(ConvertEvent::FileStarted {
                    index: index + 1,
                    total,
                    path: file.path.clone(),
                }));
                let outcome = self.encode(&job, reason, events);
                events.send(Event::Convert(ConvertEvent::FileDone {
                    path: file.path.clone(),
                }));
                outcome
            }
        }
    }

    /// Place a file that is already in the target format without encoding
    fn pass_through(&self, job: &ConversionJob) -> Result<FileOutcome, ConvertError> {
        let dir = prepare_output_dir(job)?;
        let done = FileOutcome::done(
            &job.input_path,
            Action::Passthrough {
                output: job.output_path.clone(),
            },
        );

        if self.config.delete_originals && fs::rename(&job.input_path, &job.output_path).is_ok() {
            info!(path = %job.input_path.display(), output = %job.output_path.display(), "Renamed into place");
            return Ok(done);
        }

        let output_err = |source| ConvertError::Output {
            path: job.input_path.clone(),
            source,
        };
        let mut temp = partial_file(&job.input_path, &dir).map_err(output_err)?;
        let mut source = fs::File::open(&job.input_path).map_err(output_err)?;
        io::copy(&mut source, temp.as_file_mut()).map_err(output_err)?;
        temp.as_file().sync_all().map_err(output_err)?;

        let mut warnings = Vec::new();
        if let Err(e) = job.original_times.apply_to(temp.path()) {
            warnings.push(format!("timestamps not restored: {}", e));
        }
        temp.persist_noclobber(&job.output_path)
            .map_err(|e| ConvertError::Persist {
                path: job.output_path.clone(),
                source: e.error,
            })?;
        info!(path = %job.input_path.display(), output = %job.output_path.display(), "Copied into place");

        if self.config.delete_originals {
            warnings.extend(remove_original(&job.input_path));
        }

        Ok(with_warnings(done, warnings))
    }

    fn encode(
        &self,
        job: &ConversionJob,
        reason: EncodeReason,
        events: &EventSender,
    ) -> Result<FileOutcome, ConvertError> {
        let in_place = job.input_path == job.output_path;
        let dir = prepare_output_dir(job)?;
        let temp = partial_file(&job.input_path, &dir)
            .map_err(|source| ConvertError::Output {
                path: job.input_path.clone(),
                source,
            })?
            .into_temp_path();

        info!(
            path = %job.input_path.display(),
            output = %job.output_path.display(),
            reason = %reason,
            "Encoding"
        );

        let request = EncodeRequest {
            input: job.input_path.clone(),
            output: temp.to_path_buf(),
            audio: self.config.audio,
        };
        let started = Instant::now();
        let mut on_progress = |sample: super::progress::ProgressSample| {
            let elapsed = started.elapsed().as_secs_f64();
            let (percent, eta_seconds) = estimate(sample.out_time_seconds, job.duration_seconds, elapsed);
            events.offer(Event::Convert(ConvertEvent::Progress(EncodeProgress {
                path: job.input_path.clone(),
                percent,
                eta_seconds,
                speed: sample.speed,
            })));
        };

        // On any error `temp` is dropped here, deleting the partial output
        self.encoder.encode(&request, &mut on_progress, &self.cancel)?;

        let mut warnings = Vec::new();
        if let Err(e) = job.original_times.apply_to(&temp) {
            warn!(path = %job.output_path.display(), error = %e, "Could not restore timestamps");
            warnings.push(format!("timestamps not restored: {}", e));
        }

        let placed = if in_place {
            temp.persist(&job.output_path)
        } else {
            temp.persist_noclobber(&job.output_path)
        };
        placed.map_err(|e| ConvertError::Persist {
            path: job.output_path.clone(),
            source: e.error,
        })?;
        info!(
            path = %job.input_path.display(),
            output = %job.output_path.display(),
            seconds = started.elapsed().as_secs(),
            "Encoded"
        );

        if self.config.delete_originals && !in_place {
            warnings.extend(remove_original(&job.input_path));
        }

        Ok(with_warnings(
            FileOutcome::done(
                &job.input_path,
                Action::Encoded {
                    output: job.output_path.clone(),
                },
            ),
            warnings,
        ))
    }
}

fn prepare_output_dir(job: &ConversionJob) -> Result<PathBuf, ConvertError> {
    let dir = job
        .output_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir).map_err(|source| ConvertError::Output {
        path: job.input_path.clone(),
        source,
    })?;
    Ok(dir)
}

/// Hidden temp file in `dir` named `.<stem>.<random>.partial.mp4`
fn partial_file(input: &Path, dir: &Path) -> io::Result<tempfile::NamedTempFile> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(&format!(".{}.", stem))
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(dir)
}

/// Delete a source after its output is in place; failure is only a warning
fn remove_original(path: &Path) -> Option<String> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Deleted original");
            None
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Could not delete original; output kept");
            Some(format!("original not deleted: {}", e))
        }
    }
}

fn with_warnings(mut outcome: FileOutcome, warnings: Vec<String>) -> FileOutcome {
    outcome.warnings.extend(warnings);
    outcome
}
