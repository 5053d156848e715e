//! Sequences the passes of a run.

use super::prune::prune_empty_dirs;
use super::report::{FilingDeferral, RunReport};
use crate::config::RunConfig;
use crate::core::cancel::CancelFlag;
use crate::core::convert::{
    find_unconverted, sweep_partials, AudioStreams, FfmpegEncoder, NormalizeReport, Normalizer,
    TargetFormat, VideoEncoder,
};
use crate::core::dedup::DuplicateDetector;
use crate::core::filing::{FilingPlanner, FilingPreview, Mover};
use crate::core::metadata::MetadataResolver;
use crate::core::probe::{FfprobeProber, MediaProber};
use crate::core::scanner::{DiscoveryOptions, MediaFile, MediaFilter, WalkDirScanner};
use crate::error::{ArchiveError, Result};
use crate::events::{Event, EventSender, RunEvent, RunStage};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

/// Idle cycles between heartbeat log lines in continuous mode
const HEARTBEAT_EVERY: u64 = 10;

/// Runs the archive passes against one configuration
pub struct Orchestrator {
    config: RunConfig,
    prober: Arc<dyn MediaProber>,
    encoder: Arc<dyn VideoEncoder>,
    cancel: CancelFlag,
}

impl Orchestrator {
    /// Use the given prober and encoder
    pub fn new(config: RunConfig, prober: Arc<dyn MediaProber>, encoder: Arc<dyn VideoEncoder>) -> Self {
        Self {
            config,
            prober,
            encoder,
            cancel: CancelFlag::new(),
        }
    }

    /// Use `ffprobe` and `ffmpeg` from the configured paths, failing before
    /// any file work if a required binary is missing. `ffmpeg` is only
    /// required when videos will be encoded.
    pub fn with_external_tools(config: RunConfig, needs_encoder: bool) -> Result<Self> {
        let prober = FfprobeProber::new(&config.ffprobe_path);
        prober.ensure_available()?;

        let encoder = FfmpegEncoder::new(&config.ffmpeg_path, config.encoder.clone());
        if needs_encoder {
            encoder.ensure_available()?;
        }

        Ok(Self::new(config, Arc::new(prober), Arc::new(encoder)))
    }

    /// Share a cancellation flag with the caller
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// One full run: optional normalization, verification, filing, then
    /// pruning in single-run mode
    pub fn run_once(&self, events: &EventSender) -> Result<RunReport> {
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);
        let _guard = span.enter();

        info!(source = %self.config.source_root.display(), archive = %self.config.archive_root.display(), "Run started");
        events.send(Event::Run(RunEvent::Started {
            run_id: run_id.clone(),
        }));
        let mut report = RunReport::new(run_id.clone());
        let source = self.config.source_root.as_path();

        if self.config.normalize_videos {
            self.stage(RunStage::Normalizing, events)?;
            let normalized = self.normalize_pass(AudioStreams::All, &mut report, events)?;
            report.normalization = Some(normalized);
        }

        self.stage(RunStage::Verifying, events)?;
        let deferral = self.verify(&mut report, events)?;
        if !deferral.is_empty() {
            warn!(
                unstable = deferral.unstable.len(),
                unconverted = deferral.unconverted.len(),
                "Source not settled, filing deferred to the next run"
            );
            events.send(Event::Run(RunEvent::FilingDeferred {
                unstable: deferral.unstable.len(),
                unconverted: deferral.unconverted.len(),
            }));
            report.deferred = Some(deferral);
        } else {
            self.stage(RunStage::Filing, events)?;
            let files = self.discover_for_filing(&mut report, events)?;
            let planner = FilingPlanner::new(&self.config.archive_root);
            let items: Vec<_> = files
                .into_iter()
                .map(|file| {
                    let plan = planner.plan(&file);
                    (file, plan)
                })
                .collect();
            report.filing = Some(self.mover().move_all(&items, events));

            if !self.config.continuous {
                self.stage(RunStage::Pruning, events)?;
                report.pruned_dirs = prune_empty_dirs(source);
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        let summary = report.summary();
        info!(
            moved = summary.moved,
            converted = summary.converted,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_ms = report.duration_ms,
            "Run complete"
        );
        events.send(Event::Run(RunEvent::Completed {
            run_id,
            duration_ms: report.duration_ms,
        }));
        Ok(report)
    }

    /// Repeat [`run_once`](Self::run_once) until cancelled. The interval is
    /// measured from the end of one run to the start of the next, so runs
    /// never overlap. Returns the number of completed runs.
    pub fn run_continuous(
        &self,
        events: &EventSender,
        mut on_report: impl FnMut(&RunReport),
    ) -> Result<u64> {
        let interval = Duration::from_secs(self.config.interval_secs);
        let mut cycles: u64 = 0;
        info!(interval_secs = self.config.interval_secs, "Watching for new files");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.run_once(events) {
                Ok(report) => on_report(&report),
                Err(ArchiveError::Cancelled) => break,
                Err(e @ ArchiveError::Aborted { .. }) => return Err(e),
                Err(e) => error!(error = %e, "Run failed, retrying next interval"),
            }
            cycles += 1;

            if cycles % HEARTBEAT_EVERY == 0 {
                info!(cycles, "Still watching");
            }

            if !self.sleep(interval) {
                break;
            }
        }

        info!(cycles, "Stopped watching");
        Ok(cycles)
    }

    /// Normalization over a recursive file list with the output tree
    /// mirrored under the output root
    pub fn convert(&self, events: &EventSender) -> Result<RunReport> {
        let start = Instant::now();
        let mut report = RunReport::new(Uuid::new_v4().to_string());
        let span = info_span!("convert", run_id = %report.run_id);
        let _guard = span.enter();

        let normalized = self.normalize_pass(AudioStreams::FirstOnly, &mut report, events)?;
        report.normalization = Some(normalized);
        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Duplicate detection over the source tree
    pub fn dedup(&self, events: &EventSender) -> Result<RunReport> {
        let start = Instant::now();
        let mut report = RunReport::new(Uuid::new_v4().to_string());
        let span = info_span!("dedup", run_id = %report.run_id, dry_run = self.config.dry_run);
        let _guard = span.enter();

        let videos = self.discover(
            &self.config.source_root,
            self.video_options(),
            None,
            &mut report,
            events,
        )?;
        let detector = DuplicateDetector::new(self.prober.clone(), self.config.dedup_config());
        report.dedup = Some(detector.run(&videos, events)?);
        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Plan filing for everything in the source tree without moving anything
    pub fn preview(&self, events: &EventSender) -> Result<FilingPreview> {
        let mut report = RunReport::new(Uuid::new_v4().to_string());
        let filter = self.filing_filter();
        let files: Vec<MediaFile> = self
            .discover_for_filing(&mut report, events)?
            .into_iter()
            .filter(|f| !filter.is_ignored_name(&f.name) && filter.allows_extension(&f.extension))
            .collect();
        Ok(FilingPlanner::new(&self.config.archive_root).preview(&files))
    }

    fn normalize_pass(
        &self,
        audio: AudioStreams,
        report: &mut RunReport,
        events: &EventSender,
    ) -> Result<NormalizeReport> {
        let source = &self.config.source_root;
        let output_root = self.config.output_root();

        sweep_partials(output_root);
        let videos = self.discover(source, self.video_options(), None, report, events)?;

        Normalizer::new(
            self.prober.clone(),
            self.encoder.clone(),
            self.config.normalize_config(audio),
        )
        .with_cancel(self.cancel.clone())
        .normalize(source, output_root, &videos, events)
    }

    /// Collect what would block filing: unstable files anywhere in the
    /// source, and videos still waiting for their normalized copy
    fn verify(&self, report: &mut RunReport, events: &EventSender) -> Result<FilingDeferral> {
        let files = self.discover(
            &self.config.source_root,
            DiscoveryOptions::all_files(&self.config.ignore_names),
            None,
            report,
            events,
        )?;

        let gate = self.config.stability_gate();
        let unstable = files
            .iter()
            .filter(|f| !gate.is_file_stable(f))
            .map(|f| f.path.clone())
            .collect();

        // Only videos the normalization pass picks up can block filing
        let unconverted = if self.config.normalize_videos {
            // Same walk as the normalization pass; its warnings are already recorded
            let videos = WalkDirScanner::new(self.video_options())
                .discover(&self.config.source_root, events)?
                .files;
            find_unconverted(
                &videos,
                &self.config.source_root,
                self.config.output_root(),
                &TargetFormat::default(),
            )
        } else {
            Vec::new()
        };

        Ok(FilingDeferral {
            unstable,
            unconverted,
        })
    }

    fn discover_for_filing(&self, report: &mut RunReport, events: &EventSender) -> Result<Vec<MediaFile>> {
        let resolver = MetadataResolver::new().with_container_dates(self.prober.clone());
        self.discover(
            &self.config.source_root,
            DiscoveryOptions::all_files(&self.config.ignore_names),
            Some(resolver),
            report,
            events,
        )
    }

    fn discover(
        &self,
        root: &Path,
        options: DiscoveryOptions,
        resolver: Option<MetadataResolver>,
        report: &mut RunReport,
        events: &EventSender,
    ) -> Result<Vec<MediaFile>> {
        let mut scanner = WalkDirScanner::new(options);
        if let Some(resolver) = resolver {
            scanner = scanner.with_resolver(resolver);
        }
        let result = scanner.discover(root, events)?;
        report.warnings.extend(result.errors.iter().map(|e| e.to_string()));
        report.warnings.extend(result.warnings);
        Ok(result.files)
    }

    /// Discovery used by every video pass
    fn video_options(&self) -> DiscoveryOptions {
        DiscoveryOptions::videos(&self.config.video_extensions).ignoring(&self.config.ignore_names)
    }

    fn filing_filter(&self) -> MediaFilter {
        MediaFilter::new()
            .with_ignore_names(self.config.ignore_names.iter().cloned())
            .with_extensions(&self.config.filing_extensions)
    }

    fn mover(&self) -> Mover {
        Mover::new(self.filing_filter()).verify_checksum(self.config.verify_checksum)
    }

    fn stage(&self, stage: RunStage, events: &EventSender) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }
        info!(%stage, "Stage");
        events.send(Event::Run(RunEvent::StageChanged { stage }));
        Ok(())
    }

    /// Sleep in one-second steps; false if cancelled meanwhile
    fn sleep(&self, total: Duration) -> bool {
        let step = Duration::from_secs(1);
        let mut slept = Duration::ZERO;
        while slept < total {
            if self.cancel.is_cancelled() {
                return false;
            }
            let chunk = step.min(total - slept);
            thread::sleep(chunk);
            slept += chunk;
        }
        !self.cancel.is_cancelled()
    }
}
