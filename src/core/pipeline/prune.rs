//! Empty-directory cleanup of the source tree.

use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Remove empty directories under `root`, deepest first. The root itself is
/// never removed. Returns how many were removed.
pub fn prune_empty_dirs(root: &Path) -> usize {
    let mut removed = 0;

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        // Fails harmlessly when the directory still has entries
        match fs::remove_dir(entry.path()) {
            Ok(()) => {
                debug!(path = %entry.path().display(), "Removed empty directory");
                removed += 1;
            }
            Err(_) => continue,
        }
    }

    if removed > 0 {
        info!(root = %root.display(), removed, "Pruned empty directories");
    }
    removed
}
