//! # CLI Module
//!
//! Command-line interface for the media archiver.
//!
//! ## Usage
//! ```bash
//! # File everything in the inbox into the archive
//! media-archive run ~/Inbox ~/Archive
//!
//! # Normalize videos first, deleting the originals
//! media-archive run ~/Inbox ~/Archive --normalize-videos --delete-originals
//!
//! # Keep watching the inbox
//! media-archive run ~/Inbox ~/Archive --watch --interval 120
//!
//! # Convert videos into a mirrored tree
//! media-archive convert ~/Inbox --output-root ~/Converted
//!
//! # See which originals duplicate a normalized copy
//! media-archive dedup ~/Inbox --dry-run
//!
//! # Preview where files would go
//! media-archive plan ~/Inbox ~/Archive --output json
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use media_archiver::core::filing::FilingPreview;
use media_archiver::core::{Action, CancelFlag, FileOutcome, Orchestrator, Outcome, RunReport};
use media_archiver::error::{ArchiveError, Result};
use media_archiver::events::{
    ConvertEvent, DedupEvent, Event, EventChannel, EventReceiver, FilingEvent, RunEvent,
};
use media_archiver::{init_tracing, RunConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread::{self, JoinHandle};
use tracing::warn;

/// Media Archiver - file photos and videos into a dated archive
#[derive(Parser, Debug)]
#[command(name = "media-archive")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Skip the confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Normalize (optionally) and file the source into the archive
    Run {
        /// Inbound folder
        source: Option<PathBuf>,

        /// Archive root
        archive: Option<PathBuf>,

        /// Keep running on a fixed interval
        #[arg(long)]
        watch: bool,

        /// Seconds between runs in watch mode
        #[arg(long)]
        interval: Option<u64>,

        /// Convert videos to H.264/MP4 before filing
        #[arg(long)]
        normalize_videos: bool,

        /// Seconds a file must be unmodified before it is touched
        #[arg(long)]
        stability_threshold: Option<u64>,

        /// Only compare sizes after copying, not content digests
        #[arg(long)]
        no_verify_checksum: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Normalize videos, mirroring the folder tree under the output root
    Convert {
        /// Folder to scan for videos
        source: Option<PathBuf>,

        /// Where converted files go (defaults to next to the source)
        #[arg(long)]
        output_root: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Delete originals whose normalized MP4 sibling has the same duration
    Dedup {
        /// Folder to scan for videos
        source: Option<PathBuf>,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Show where every file would be filed, without moving anything
    Plan {
        /// Inbound folder
        source: Option<PathBuf>,

        /// Archive root
        archive: Option<PathBuf>,

        /// Path to ffprobe (used for video creation dates)
        #[arg(long)]
        ffprobe: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Delete originals once their output is in place
    #[arg(long)]
    delete_originals: bool,

    /// Stop at the first failed file
    #[arg(long)]
    stop_on_error: bool,

    /// Path to ffmpeg
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Path to ffprobe
    #[arg(long)]
    ffprobe: Option<PathBuf>,
}

impl CommonArgs {
    fn apply(self, config: &mut RunConfig) {
        config.delete_originals |= self.delete_originals;
        config.stop_on_error |= self.stop_on_error;
        if let Some(ffmpeg) = self.ffmpeg {
            config.ffmpeg_path = ffmpeg;
        }
        if let Some(ffprobe) = self.ffprobe {
            config.ffprobe_path = ffprobe;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// What a command asks the orchestrator to do
enum Task {
    Once,
    Watch,
    Convert,
    Dedup,
    Plan,
}

/// Run the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let term = Term::stderr();

    match execute(cli, &term) {
        Ok(code) => code,
        Err(ArchiveError::Cancelled) => {
            term.write_line(&format!("{} Cancelled", style("!").yellow().bold()))
                .ok();
            ExitCode::from(130)
        }
        Err(e) => {
            term.write_line(&format!("{} {}", style("✗").red().bold(), e))
                .ok();
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli, term: &Term) -> Result<ExitCode> {
    let mut config = RunConfig::load(cli.config.as_deref())?;
    let output = cli.output;
    let verbose = cli.verbose;

    let task = match cli.command {
        Commands::Run {
            source,
            archive,
            watch,
            interval,
            normalize_videos,
            stability_threshold,
            no_verify_checksum,
            common,
        } => {
            set_roots(&mut config, source, archive);
            config.continuous |= watch;
            config.normalize_videos |= normalize_videos;
            if no_verify_checksum {
                config.verify_checksum = false;
            }
            if let Some(interval) = interval {
                config.interval_secs = interval;
            }
            if let Some(threshold) = stability_threshold {
                config.stability_threshold_secs = threshold;
            }
            common.apply(&mut config);
            config.validate()?;
            if config.continuous {
                Task::Watch
            } else {
                Task::Once
            }
        }
        Commands::Convert {
            source,
            output_root,
            common,
        } => {
            set_roots(&mut config, source, None);
            if output_root.is_some() {
                config.output_root = output_root;
            }
            common.apply(&mut config);
            config.validate_source()?;
            Task::Convert
        }
        Commands::Dedup {
            source,
            dry_run,
            common,
        } => {
            set_roots(&mut config, source, None);
            config.dry_run |= dry_run;
            common.apply(&mut config);
            config.validate_source()?;
            Task::Dedup
        }
        Commands::Plan {
            source,
            archive,
            ffprobe,
        } => {
            set_roots(&mut config, source, archive);
            if let Some(ffprobe) = ffprobe {
                config.ffprobe_path = ffprobe;
            }
            config.validate()?;
            Task::Plan
        }
    };

    let mutating = match task {
        Task::Once | Task::Convert => true,
        Task::Dedup => !config.dry_run,
        Task::Watch | Task::Plan => false,
    };
    if mutating && !cli.yes && !confirm(term, &config, &task)? {
        term.write_line("Nothing was changed.").ok();
        return Ok(ExitCode::SUCCESS);
    }

    let needs_encoder = match task {
        Task::Once | Task::Watch => config.normalize_videos,
        Task::Convert => true,
        Task::Dedup | Task::Plan => false,
    };
    let cancel = CancelFlag::new();
    install_interrupt_handler(cancel.clone());
    let orchestrator = Orchestrator::with_external_tools(config, needs_encoder)?.with_cancel(cancel);

    let (sender, receiver) = EventChannel::new();
    let renderer = (output == OutputFormat::Pretty).then(|| spawn_renderer(receiver));

    let result = match task {
        Task::Plan => orchestrator.preview(&sender).map(|preview| {
            print_preview(term, &preview, output, verbose);
            None
        }),
        Task::Watch => orchestrator
            .run_continuous(&sender, |report| print_report(term, report, output, verbose))
            .map(|_| None),
        Task::Once => orchestrator.run_once(&sender).map(Some),
        Task::Convert => orchestrator.convert(&sender).map(Some),
        Task::Dedup => orchestrator.dedup(&sender).map(Some),
    };

    drop(sender);
    if let Some(handle) = renderer {
        handle.join().ok();
    }

    match result? {
        Some(report) => {
            print_report(term, &report, output, verbose);
            Ok(if report.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

fn set_roots(config: &mut RunConfig, source: Option<PathBuf>, archive: Option<PathBuf>) {
    if let Some(source) = source {
        config.source_root = source;
    }
    if let Some(archive) = archive {
        config.archive_root = archive;
    }
}

fn install_interrupt_handler(cancel: CancelFlag) {
    let result = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            // Second interrupt: stop waiting for the current file
            std::process::exit(130);
        }
        cancel.cancel();
    });
    if let Err(e) = result {
        warn!(error = %e, "Could not install interrupt handler");
    }
}

/// Ask once before touching files. Declining is not an error.
fn confirm(term: &Term, config: &RunConfig, task: &Task) -> Result<bool> {
    let action = match task {
        Task::Once => format!(
            "File {} into {}{}",
            config.source_root.display(),
            config.archive_root.display(),
            if config.normalize_videos {
                " after normalizing videos"
            } else {
                ""
            }
        ),
        Task::Convert => format!(
            "Convert videos under {} into {}",
            config.source_root.display(),
            config.output_root().display()
        ),
        Task::Dedup => format!("Delete duplicate originals under {}", config.source_root.display()),
        Task::Watch | Task::Plan => return Ok(true),
    };

    term.write_line(&format!("{} {}", style("?").cyan().bold(), action))?;
    if config.delete_originals {
        term.write_line(&format!(
            "  {}",
            style("Originals will be deleted after conversion.").yellow()
        ))?;
    }
    term.write_str("Continue? [y/N] ")?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn spawn_renderer(receiver: EventReceiver) -> JoinHandle<()> {
    thread::spawn(move || {
        let pb = ProgressBar::new(0);
        pb.set_style(bar_style());

        for event in receiver.iter() {
            match event {
                Event::Run(RunEvent::StageChanged { stage }) => {
                    pb.set_message(stage.to_string());
                }
                Event::Run(RunEvent::FilingDeferred {
                    unstable,
                    unconverted,
                }) => {
                    pb.println(format!(
                        "{} Filing deferred: {} unstable, {} unconverted",
                        style("!").yellow().bold(),
                        unstable,
                        unconverted
                    ));
                }
                Event::Filing(FilingEvent::Started { total_files }) => {
                    pb.set_length(total_files as u64);
                    pb.set_position(0);
                }
                Event::Filing(FilingEvent::FileDone { completed, path, .. }) => {
                    pb.set_position(completed as u64);
                    pb.set_message(file_name(&path));
                }
                Event::Convert(ConvertEvent::FileStarted { index, total, path }) => {
                    pb.set_length(100);
                    pb.set_position(0);
                    pb.set_message(format!("Encoding {} ({}/{})", file_name(&path), index, total));
                }
                Event::Convert(ConvertEvent::Progress(progress)) => {
                    if let Some(percent) = progress.percent {
                        pb.set_position(percent as u64);
                    }
                    let mut message = format!("Encoding {}", file_name(&progress.path));
                    if let Some(eta) = progress.eta_seconds {
                        message.push_str(&format!(" ~{}s left", eta.round() as u64));
                    }
                    if let Some(speed) = progress.speed {
                        message.push_str(&format!(" ({:.1}x)", speed));
                    }
                    pb.set_message(message);
                }
                Event::Dedup(DedupEvent::Started { groups }) => {
                    pb.set_length(groups as u64);
                    pb.set_position(0);
                    pb.set_message("Comparing durations");
                }
                Event::Dedup(DedupEvent::GroupChecked { completed, .. }) => {
                    pb.set_position(completed as u64);
                }
                Event::Run(RunEvent::Completed { .. }) => {
                    // Watch mode reuses the bar for the next run
                    pb.set_length(0);
                    pb.set_position(0);
                    pb.set_message("Waiting");
                }
                _ => {}
            }
        }
        pb.finish_and_clear();
    })
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

fn print_report(term: &Term, report: &RunReport, output: OutputFormat, verbose: bool) {
    if output == OutputFormat::Json {
        print_json(report);
        return;
    }

    let summary = report.summary();
    term.write_line("").ok();
    term.write_line(&format!(
        "{} Run {} finished in {:.1}s",
        style("✓").green().bold(),
        style(&report.run_id[..8.min(report.run_id.len())]).dim(),
        report.duration_ms as f64 / 1000.0
    ))
    .ok();

    if report.normalization.is_some() {
        term.write_line(&format!(
            "  {} encoded, {} passed through",
            style(summary.converted).cyan(),
            style(summary.passthrough).cyan()
        ))
        .ok();
    }
    if let Some(deferral) = &report.deferred {
        term.write_line(&format!(
            "  {} filing deferred ({} unstable, {} unconverted)",
            style("!").yellow(),
            deferral.unstable.len(),
            deferral.unconverted.len()
        ))
        .ok();
    }
    if report.filing.is_some() {
        term.write_line(&format!("  {} files moved", style(summary.moved).cyan()))
            .ok();
    }
    if let Some(dedup) = &report.dedup {
        let simulated = dedup
            .outcomes
            .iter()
            .any(|o| matches!(o.outcome, Outcome::Done(Action::WouldDelete { .. })));
        term.write_line(&format!(
            "  {} duplicates {}",
            style(summary.duplicates).cyan(),
            if simulated { "would be deleted" } else { "deleted" }
        ))
        .ok();
    }
    if report.pruned_dirs > 0 {
        term.write_line(&format!(
            "  {} empty folders removed",
            style(report.pruned_dirs).dim()
        ))
        .ok();
    }
    term.write_line(&format!(
        "  {} skipped, {} failed",
        style(summary.skipped).dim(),
        if summary.failed > 0 {
            style(summary.failed).red().bold()
        } else {
            style(summary.failed).dim()
        }
    ))
    .ok();

    for outcome in all_outcomes(report) {
        let show = verbose || outcome.is_failed() || !outcome.warnings.is_empty();
        if show {
            term.write_line(&format!("    {}", describe(outcome))).ok();
        }
    }
    if verbose {
        for warning in &report.warnings {
            term.write_line(&format!("    {} {}", style("note").dim(), warning))
                .ok();
        }
    }
}

fn all_outcomes(report: &RunReport) -> impl Iterator<Item = &FileOutcome> {
    let normalization = report.normalization.iter().flat_map(|r| r.outcomes.iter());
    let filing = report.filing.iter().flat_map(|r| r.outcomes.iter());
    let dedup = report.dedup.iter().flat_map(|r| r.outcomes.iter());
    normalization.chain(filing).chain(dedup)
}

fn describe(outcome: &FileOutcome) -> String {
    let path = outcome.path.display();
    let mut line = match &outcome.outcome {
        Outcome::Done(Action::Moved { destination }) => {
            format!("{} {} → {}", style("moved").green(), path, destination.display())
        }
        Outcome::Done(Action::Encoded { output }) => {
            format!("{} {} → {}", style("encoded").green(), path, output.display())
        }
        Outcome::Done(Action::Passthrough { output }) => {
            format!("{} {} → {}", style("copied").green(), path, output.display())
        }
        Outcome::Done(Action::DeletedDuplicate { canonical }) => format!(
            "{} {} (duplicate of {})",
            style("deleted").yellow(),
            path,
            canonical.display()
        ),
        Outcome::Done(Action::WouldDelete { canonical }) => format!(
            "{} {} (duplicate of {})",
            style("would delete").yellow(),
            path,
            canonical.display()
        ),
        Outcome::Skipped(reason) => format!("{} {} ({})", style("skipped").dim(), path, reason),
        Outcome::Failed { reason } => format!("{} {}: {}", style("failed").red(), path, reason),
    };
    for warning in &outcome.warnings {
        line.push_str(&format!(" [{}]", style(warning).yellow()));
    }
    line
}

fn print_preview(term: &Term, preview: &FilingPreview, output: OutputFormat, verbose: bool) {
    if output == OutputFormat::Json {
        print_json(preview);
        return;
    }

    term.write_line(&format!(
        "{} {} files, {}",
        style("Filing plan:").bold(),
        style(preview.files.len()).cyan(),
        format_bytes(preview.total_size_bytes)
    ))
    .ok();
    if let Some((earliest, latest)) = &preview.date_range {
        term.write_line(&format!("  Dates {} to {}", earliest, latest)).ok();
    }
    term.write_line(&format!(
        "  {} dated from metadata, {} from file times",
        preview.from_metadata, preview.from_filesystem
    ))
    .ok();
    for year in &preview.by_year {
        term.write_line(&format!(
            "  {} {} files ({})",
            style(year.year).bold(),
            year.count,
            format_bytes(year.size_bytes)
        ))
        .ok();
    }
    if preview.conflict_count > 0 {
        term.write_line(&format!(
            "  {} {} files would be skipped: destination taken",
            style("!").yellow(),
            preview.conflict_count
        ))
        .ok();
    }

    for file in &preview.files {
        let conflict = file.destination_exists || file.conflicts_in_batch;
        if verbose || conflict {
            let marker = if conflict {
                style("○").yellow().to_string()
            } else {
                style("→").dim().to_string()
            };
            term.write_line(&format!(
                "    {} {} {}",
                file.source.display(),
                marker,
                file.plan.destination_path.display()
            ))
            .ok();
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!(error = %e, "Could not serialize output"),
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
