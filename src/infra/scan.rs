use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Directories exactly `depth` levels below each base. Hidden entries are
/// skipped along with everything under them; symlinks are not followed.
pub fn scan_directories(base_dirs: &[PathBuf], depth: usize) -> Vec<PathBuf> {
    let depth = depth.max(1);
    let mut found = BTreeSet::new();

    for base in base_dirs {
        if !base.is_dir() {
            continue;
        }
        let walker = WalkDir::new(base)
            .follow_links(false)
            .max_depth(depth)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || is_visible_dir(entry));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(base = %base.display(), %error, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == depth {
                found.insert(entry.into_path());
            }
        }
    }

    found.into_iter().collect()
}

/// `owner/repo` names of the clones already present under `base`.
pub fn cloned_repo_names(base: &Path) -> BTreeSet<String> {
    scan_directories(&[base.to_path_buf()], 2)
        .iter()
        .filter_map(|path| {
            let rel = path.strip_prefix(base).ok()?;
            Some(rel.to_string_lossy().replace('\\', "/"))
        })
        .collect()
}

fn is_visible_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && !entry.file_name().to_string_lossy().starts_with('.')
}
