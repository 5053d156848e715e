//! Moves planned files into the archive.
//!
//! Moves are copy, verify, then delete: the archive may live on another
//! volume, so a rename cannot be relied on. The source is only removed once
//! a verified copy sits at the destination.

use super::types::*;
use crate::core::outcome::{Action, FileOutcome, SkipReason};
use crate::core::scanner::{is_partial_output, MediaFile, MediaFilter, COPY_PARTIAL_SUFFIX};
use crate::error::FilingError;
use crate::events::{Event, EventSender, FilingEvent};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use xxhash_rust::xxh3::Xxh3;

/// Moves files into the archive, one at a time
#[derive(Debug, Clone)]
pub struct Mover {
    filter: MediaFilter,
    verify_checksum: bool,
}

impl Mover {
    /// `filter` supplies the ignore list and extension allow-list
    pub fn new(filter: MediaFilter) -> Self {
        Self {
            filter,
            verify_checksum: true,
        }
    }

    /// Compare content digests, not just sizes, before deleting sources
    pub fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// File every planned item, continuing past failures
    pub fn move_all(&self, items: &[(MediaFile, FilingPlan)], events: &EventSender) -> FilingReport {
        let start = Instant::now();
        let total = items.len();
        let mut report = FilingReport::default();
        let mut created_dirs: HashSet<PathBuf> = HashSet::new();

        events.send(Event::Filing(FilingEvent::Started { total_files: total }));

        for (i, (file, plan)) in items.iter().enumerate() {
            let dir = &plan.destination_directory;
            if !created_dirs.contains(dir) {
                let existed = dir.is_dir();
                if let Err(source) = fs::create_dir_all(dir) {
                    let err = FilingError::CreateDir {
                        path: dir.clone(),
                        source,
                    };
                    error!(path = %file.path.display(), error = %err, "Cannot create destination");
                    report.outcomes.push(FileOutcome::failed(&file.path, err));
                    self.notify(events, i, total, file);
                    continue;
                }
                if existed {
                    remove_stale_partials(dir);
                } else {
                    report.folders_created += 1;
                }
                created_dirs.insert(dir.clone());
            }

            let outcome = self.move_one(file, plan);
            if outcome.is_done() {
                report.bytes_moved += file.stats.size;
            }
            report.outcomes.push(outcome);
            self.notify(events, i, total, file);
        }

        let counts = report.counts();
        events.send(Event::Filing(FilingEvent::Completed {
            moved: counts.done,
            skipped: counts.skipped,
            failed: counts.failed,
        }));

        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// File one item whose destination directory already exists
    pub fn move_one(&self, file: &MediaFile, plan: &FilingPlan) -> FileOutcome {
        if self.filter.is_ignored_name(&file.name) {
            debug!(path = %file.path.display(), "Ignored name");
            return FileOutcome::skipped(&file.path, SkipReason::Ignored);
        }

        if !self.filter.allows_extension(&file.extension) {
            info!(path = %file.path.display(), "Extension not allowed, skipping");
            return FileOutcome::skipped(&file.path, SkipReason::ExtensionNotAllowed);
        }

        if plan.destination_path.exists() {
            warn!(
                path = %file.path.display(),
                destination = %plan.destination_path.display(),
                "Destination exists, never overwriting"
            );
            return FileOutcome::skipped(
                &file.path,
                SkipReason::DestinationExists {
                    destination: plan.destination_path.clone(),
                },
            );
        }

        match self.transfer(file, plan) {
            Ok(warnings) => {
                info!(
                    path = %file.path.display(),
                    destination = %plan.destination_path.display(),
                    "Filed"
                );
                let mut outcome = FileOutcome::done(
                    &file.path,
                    Action::Moved {
                        destination: plan.destination_path.clone(),
                    },
                );
                outcome.warnings = warnings;
                outcome
            }
            Err(e) => {
                error!(path = %file.path.display(), error = %e, "Filing failed");
                FileOutcome::failed(&file.path, e)
            }
        }
    }

    /// Copy into a hidden temp file beside the destination, verify, stamp
    /// the original times, move it into place without clobbering, then
    /// remove the source.
    fn transfer(&self, file: &MediaFile, plan: &FilingPlan) -> Result<Vec<String>, FilingError> {
        let mut warnings = Vec::new();
        let copy_err = |source: io::Error| FilingError::Copy {
            from: file.path.clone(),
            to: plan.destination_path.clone(),
            source,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file.name))
            .suffix(COPY_PARTIAL_SUFFIX)
            .tempfile_in(&plan.destination_directory)
            .map_err(copy_err)?;

        let mut source = File::open(&file.path).map_err(copy_err)?;
        io::copy(&mut source, temp.as_file_mut()).map_err(copy_err)?;
        temp.as_file().sync_all().map_err(copy_err)?;

        self.verify(&file.path, temp.path())?;

        if let Err(e) = file.stats.times.apply_to(temp.path()) {
            warn!(path = %file.path.display(), error = %e, "Could not restore timestamps");
            warnings.push(format!("timestamps not restored: {}", e));
        }

        temp.persist_noclobber(&plan.destination_path)
            .map_err(|e| copy_err(e.error))?;

        fs::remove_file(&file.path).map_err(|source| FilingError::RemoveSource {
            path: file.path.clone(),
            source,
        })?;

        Ok(warnings)
    }

    fn verify(&self, source: &Path, copy: &Path) -> Result<(), FilingError> {
        let verify_err = |reason: String| FilingError::Verify {
            path: source.to_path_buf(),
            reason,
        };

        let source_size = fs::metadata(source).map_err(|e| verify_err(e.to_string()))?.len();
        let copy_size = fs::metadata(copy).map_err(|e| verify_err(e.to_string()))?.len();
        if source_size != copy_size {
            return Err(verify_err(format!(
                "source {} bytes, copy {} bytes",
                source_size, copy_size
            )));
        }

        if self.verify_checksum {
            let source_digest = digest(source).map_err(|e| verify_err(e.to_string()))?;
            let copy_digest = digest(copy).map_err(|e| verify_err(e.to_string()))?;
            if source_digest != copy_digest {
                return Err(verify_err("content digest mismatch".to_string()));
            }
        }

        Ok(())
    }

    fn notify(&self, events: &EventSender, index: usize, total: usize, file: &MediaFile) {
        events.send(Event::Filing(FilingEvent::FileDone {
            completed: index + 1,
            total,
            path: file.path.clone(),
        }));
    }
}

/// Delete copies an interrupted run left in `dir`; not recursive
fn remove_stale_partials(dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Could not list destination");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) || !is_partial_output(&path) {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Removed stale partial copy");
                removed += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove partial copy"),
        }
    }
    removed
}

/// xxh3-64 digest of a file's contents
fn digest(path: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Xxh3::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.digest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filing::FilingPlanner;
    use crate::core::scanner::FileStats;
    use crate::core::timestamps::FileTimes;
    use crate::events::null_sender;
    use chrono::NaiveDate;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn media_file(path: PathBuf) -> MediaFile {
        let metadata = fs::metadata(&path).unwrap();
        let stats = FileStats {
            size: metadata.len(),
            times: FileTimes::from_metadata(&metadata),
        };
        let mut file = MediaFile::new(path, stats);
        file.filing_date = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        file
    }

    fn setup(name: &str, content: &[u8]) -> (TempDir, TempDir, MediaFile, FilingPlan) {
        let src = TempDir::new().unwrap();
        let archive = TempDir::new().unwrap();
        let path = src.path().join(name);
        fs::write(&path, content).unwrap();
        let file = media_file(path);
        let plan = FilingPlanner::new(archive.path()).plan(&file);
        (src, archive, file, plan)
    }

    #[test]
    fn moves_file_and_preserves_mtime() {
        let archive = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let path = src.path().join("photo.jpg");
        fs::write(&path, b"test content").unwrap();
        let past = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(past)).unwrap();
        let file = media_file(path.clone());
        let plan = FilingPlanner::new(archive.path()).plan(&file);

        let report = Mover::new(MediaFilter::new()).move_all(&[(file, plan.clone())], &null_sender());

        assert_eq!(report.counts().done, 1);
        assert_eq!(report.folders_created, 1);
        assert!(!path.exists());
        assert_eq!(fs::read(&plan.destination_path).unwrap(), b"test content");
        assert_eq!(
            fs::metadata(&plan.destination_path).unwrap().modified().unwrap(),
            past
        );
    }

    #[test]
    fn existing_destination_is_never_overwritten() {
        let (_src, _archive, file, plan) = setup("photo.jpg", b"new");
        fs::create_dir_all(&plan.destination_directory).unwrap();
        fs::write(&plan.destination_path, b"archived").unwrap();

        let outcome = Mover::new(MediaFilter::new()).move_one(&file, &plan);

        assert!(matches!(
            outcome.outcome,
            crate::core::outcome::Outcome::Skipped(SkipReason::DestinationExists { .. })
        ));
        assert_eq!(fs::read(&file.path).unwrap(), b"new");
        assert_eq!(fs::read(&plan.destination_path).unwrap(), b"archived");
    }

    #[test]
    fn ignored_and_disallowed_are_distinct_skips() {
        let (_src, _archive, ignored, ignored_plan) = setup(".DS_Store", b"x");
        let (_src2, _archive2, text, text_plan) = setup("notes.txt", b"x");
        let mover = Mover::new(
            MediaFilter::new()
                .with_ignore_names([".DS_Store"])
                .with_extensions(["jpg"]),
        );

        let report = mover.move_all(
            &[(ignored.clone(), ignored_plan), (text.clone(), text_plan)],
            &null_sender(),
        );

        assert_eq!(report.outcomes[0].outcome, crate::core::outcome::Outcome::Skipped(SkipReason::Ignored));
        assert_eq!(
            report.outcomes[1].outcome,
            crate::core::outcome::Outcome::Skipped(SkipReason::ExtensionNotAllowed)
        );
        assert!(ignored.path.exists());
        assert!(text.path.exists());
    }

    #[test]
    fn missing_source_fails_without_stopping_batch() {
        let (_src, archive, good, good_plan) = setup("good.jpg", b"ok");
        let mut missing = good.clone();
        missing.path = PathBuf::from("/nonexistent/file.jpg");
        missing.name = "file.jpg".to_string();
        let missing_plan = FilingPlanner::new(archive.path()).plan(&missing);

        let report = Mover::new(MediaFilter::new()).move_all(
            &[(missing, missing_plan.clone()), (good, good_plan.clone())],
            &null_sender(),
        );

        assert!(report.outcomes[0].is_failed());
        assert!(report.outcomes[1].is_done());
        assert!(!missing_plan.destination_path.exists());
        assert!(good_plan.destination_path.exists());
    }

    #[test]
    fn no_partial_files_left_after_move() {
        let (_src, _archive, file, plan) = setup("clip.mp4", b"video bytes");
        Mover::new(MediaFilter::new()).move_all(&[(file, plan.clone())], &null_sender());

        let leftovers: Vec<_> = fs::read_dir(&plan.destination_directory)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn stale_partial_copies_are_swept_from_destination() {
        let (_src, _archive, file, plan) = setup("a.jpg", b"photo");
        fs::create_dir_all(&plan.destination_directory).unwrap();
        let stale = plan.destination_directory.join(".a.jpg.x1y2z3.partial");
        let neighbour = plan.destination_directory.join("b.jpg");
        fs::write(&stale, b"half a copy").unwrap();
        fs::write(&neighbour, b"archived").unwrap();

        let report = Mover::new(MediaFilter::new()).move_all(&[(file, plan.clone())], &null_sender());

        assert_eq!(report.counts().done, 1);
        assert!(!stale.exists());
        assert_eq!(fs::read(&neighbour).unwrap(), b"archived");
        assert_eq!(fs::read(&plan.destination_path).unwrap(), b"photo");
    }

    #[test]
    fn remove_stale_partials_ignores_visible_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".clip.mp4.abc123.partial"), b"x").unwrap();
        fs::write(dir.path().join("notes.partial"), b"x").unwrap();

        assert_eq!(remove_stale_partials(dir.path()), 1);
        assert!(dir.path().join("notes.partial").exists());
    }

    #[test]
    fn digest_differs_for_different_content() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"same size 1").unwrap();
        fs::write(&b, b"same size 2").unwrap();
        assert_ne!(digest(&a).unwrap(), digest(&b).unwrap());
        assert_eq!(digest(&a).unwrap(), digest(&a).unwrap());
    }
}
