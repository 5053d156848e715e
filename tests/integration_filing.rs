mod common;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use media_archiver::core::filing::{FilingPlanner, Mover};
use media_archiver::core::metadata::{DateSource, MetadataResolver};
use media_archiver::core::outcome::{Outcome, SkipReason};
use media_archiver::core::scanner::{
    local_naive, DiscoveryOptions, FileStats, MediaFile, MediaFilter, WalkDirScanner,
};
use media_archiver::core::timestamps::FileTimes;
use media_archiver::events::null_sender;
use predicates::prelude::*;
use std::fs;
use std::time::{Duration, UNIX_EPOCH};

fn discover_all(root: &std::path::Path) -> Vec<MediaFile> {
    WalkDirScanner::new(DiscoveryOptions::all_files(&[".DS_Store".to_string()]))
        .with_resolver(MetadataResolver::new())
        .discover(root, &null_sender())
        .unwrap()
        .files
}

#[test]
fn test_file_without_metadata_is_filed_by_creation_time() {
    let inbox = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();
    inbox.child("scan.png").write_binary(b"not really a png").unwrap();
    common::settle(inbox.child("scan.png").path());

    let files = discover_all(inbox.path());
    assert_eq!(files.len(), 1);
    let file = &files[0];
    assert_eq!(file.filing_date_source, DateSource::Filesystem);

    // The fallback is the creation time, or the modification time where the
    // platform has no birth time
    let metadata = fs::metadata(&file.path).unwrap();
    let created = metadata.created().unwrap_or(metadata.modified().unwrap());
    let expected_folder = FilingPlanner::folder_for(local_naive(created));
    assert_eq!(file.filing_date, local_naive(created));

    let planner = FilingPlanner::new(archive.path());
    let items = vec![(file.clone(), planner.plan(file))];
    let report = Mover::new(MediaFilter::new()).move_all(&items, &null_sender());

    assert_eq!(report.counts().done, 1);
    archive
        .child(expected_folder.join("scan.png"))
        .assert(predicate::path::is_file());
    inbox.child("scan.png").assert(predicate::path::missing());
}

#[test]
fn test_filing_never_overwrites_archive() {
    let inbox = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();
    inbox.child("IMG_0001.JPG").write_str("new upload").unwrap();

    let files = discover_all(inbox.path());
    let planner = FilingPlanner::new(archive.path());
    let plan = planner.plan(&files[0]);

    // Something with the same name is already archived
    fs::create_dir_all(&plan.destination_directory).unwrap();
    fs::write(&plan.destination_path, "archived original").unwrap();

    let items = [(files[0].clone(), plan.clone())];
    let report = Mover::new(MediaFilter::new()).move_all(&items, &null_sender());

    assert!(matches!(
        report.outcomes[0].outcome,
        Outcome::Skipped(SkipReason::DestinationExists { .. })
    ));
    inbox
        .child("IMG_0001.JPG")
        .assert(predicate::str::diff("new upload"));
    assert_eq!(fs::read_to_string(&plan.destination_path).unwrap(), "archived original");
}

#[test]
fn test_batch_continues_past_disallowed_and_ignored_files() {
    let inbox = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();
    inbox.child("a.jpg").write_str("a").unwrap();
    inbox.child("notes.txt").write_str("n").unwrap();
    inbox.child("nested/b.mp4").write_str("b").unwrap();
    inbox.child(".DS_Store").write_str("x").unwrap();

    let files = discover_all(inbox.path());
    // Ignored names never reach the mover
    assert_eq!(files.len(), 3);

    let planner = FilingPlanner::new(archive.path());
    let items: Vec<_> = files.iter().map(|f| (f.clone(), planner.plan(f))).collect();
    let mover = Mover::new(
        MediaFilter::new()
            .with_ignore_names([".DS_Store"])
            .with_extensions(["jpg", "mp4"]),
    );
    let report = mover.move_all(&items, &null_sender());
    let counts = report.counts();

    assert_eq!(counts.done, 2);
    assert_eq!(counts.skipped, 1);
    assert_eq!(counts.failed, 0);
    inbox.child("notes.txt").assert(predicate::path::is_file());
    inbox.child("a.jpg").assert(predicate::path::missing());
    inbox.child("nested/b.mp4").assert(predicate::path::missing());
}

#[test]
fn test_preview_reports_conflicts_without_side_effects() {
    let inbox = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();
    inbox.child("one/clip.mp4").write_str("1").unwrap();
    inbox.child("two/clip.mp4").write_str("2").unwrap();

    // Pin both files to the same month so they collide
    let march = UNIX_EPOCH + Duration::from_secs(1_710_000_000);
    let files: Vec<MediaFile> = ["one/clip.mp4", "two/clip.mp4"]
        .iter()
        .map(|rel| {
            let times = FileTimes {
                created: march,
                modified: march,
                accessed: march,
                has_birth_time: true,
            };
            MediaFile::new(inbox.child(rel).to_path_buf(), FileStats { size: 1, times })
        })
        .collect();

    let preview = FilingPlanner::new(archive.path()).preview(&files);

    assert_eq!(preview.files.len(), 2);
    assert_eq!(preview.conflict_count, 1);
    assert!(!preview.files[0].conflicts_in_batch);
    assert!(preview.files[1].conflicts_in_batch);
    assert_eq!(preview.from_filesystem, 2);
    assert_eq!(fs::read_dir(archive.path()).unwrap().count(), 0);
    inbox.child("one/clip.mp4").assert(predicate::path::is_file());
}
