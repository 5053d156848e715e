//! Groups sibling videos that differ only by extension.

use crate::core::scanner::MediaFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `(directory, lower-cased base name)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub directory: PathBuf,
    pub base_name: String,
}

impl GroupKey {
    pub fn for_path(path: &Path) -> Self {
        Self {
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            base_name: path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
        }
    }
}

/// Files sharing a directory and base name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub key: GroupKey,
    /// Members in the target container
    pub targets: Vec<PathBuf>,
    /// Everything else
    pub others: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// The single target-container member, if there is exactly one
    pub fn canonical(&self) -> Option<&Path> {
        match self.targets.as_slice() {
            [only] => Some(only.as_path()),
            _ => None,
        }
    }

    /// Exactly one target member and at least one other member
    pub fn is_candidate(&self) -> bool {
        self.canonical().is_some() && !self.others.is_empty()
    }
}

/// Group files by `(directory, base name)`, case-insensitively.
///
/// Groups come back ordered by key, members in input order.
pub fn group_siblings(files: &[MediaFile], target_container: &str) -> Vec<DuplicateGroup> {
    let mut groups: BTreeMap<GroupKey, DuplicateGroup> = BTreeMap::new();

    for file in files {
        let key = GroupKey::for_path(&file.path);
        let group = groups.entry(key.clone()).or_insert_with(|| DuplicateGroup {
            key,
            targets: Vec::new(),
            others: Vec::new(),
        });
        if file.extension.eq_ignore_ascii_case(target_container) {
            group.targets.push(file.path.clone());
        } else {
            group.others.push(file.path.clone());
        }
    }

    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::FileStats;
    use crate::core::timestamps::FileTimes;
    use std::time::SystemTime;

    fn file(path: &str) -> MediaFile {
        MediaFile::new(
            PathBuf::from(path),
            FileStats {
                size: 1,
                times: FileTimes {
                    created: SystemTime::UNIX_EPOCH,
                    modified: SystemTime::UNIX_EPOCH,
                    accessed: SystemTime::UNIX_EPOCH,
                    has_birth_time: false,
                },
            },
        )
    }

    #[test]
    fn groups_case_insensitively_within_directory() {
        let files = vec![
            file("/inbox/Holiday.MOV"),
            file("/inbox/holiday.mp4"),
            file("/inbox/other/holiday.mov"),
        ];

        let groups = group_siblings(&files, "mp4");

        assert_eq!(groups.len(), 2);
        let inbox = &groups[0];
        assert_eq!(inbox.key.base_name, "holiday");
        assert_eq!(inbox.canonical(), Some(Path::new("/inbox/holiday.mp4")));
        assert!(inbox.is_candidate());
        assert!(!groups[1].is_candidate());
    }

    #[test]
    fn two_targets_is_not_a_candidate() {
        let files = vec![
            file("/inbox/clip.mp4"),
            file("/inbox/clip.MP4"),
            file("/inbox/clip.mov"),
        ];
        let groups = group_siblings(&files, "mp4");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].canonical(), None);
        assert!(!groups[0].is_candidate());
    }

    #[test]
    fn lone_target_is_not_a_candidate() {
        let groups = group_siblings(&[file("/inbox/clip.mp4")], "mp4");
        assert!(!groups[0].is_candidate());
    }
}
