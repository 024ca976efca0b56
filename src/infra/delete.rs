use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoveFolderError {
    #[error("refusing to remove {0}: not inside a project directory")]
    OutsideProjectDirs(PathBuf),

    #[error("failed to remove folder: {0}")]
    Remove(#[from] io::Error),
}

/// Deletes `path` recursively. Only directories strictly below one of
/// `project_dirs` may be removed.
pub fn remove_project_folder(
    project_dirs: &[PathBuf],
    path: &Path,
) -> Result<(), RemoveFolderError> {
    let inside = project_dirs
        .iter()
        .any(|base| path.starts_with(base) && path != base.as_path());
    if !inside {
        return Err(RemoveFolderError::OutsideProjectDirs(path.to_path_buf()));
    }
    fs::remove_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn removes_tree_inside_project_dir() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path().to_path_buf();
        let target = base.join("acme/api");
        fs::create_dir_all(target.join("src")).expect("mkdir");
        fs::write(target.join("src/main.rs"), "fn main() {}").expect("write");

        remove_project_folder(&[base.clone()], &target).expect("remove");
        assert!(!target.exists());
        assert!(base.join("acme").exists());
    }

    #[test]
    fn refuses_paths_outside_or_equal_to_base() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path().join("repos");
        let other = dir.path().join("other");
        fs::create_dir_all(&base).expect("mkdir");
        fs::create_dir_all(&other).expect("mkdir");

        assert!(matches!(
            remove_project_folder(&[base.clone()], &other),
            Err(RemoveFolderError::OutsideProjectDirs(_))
        ));
        assert!(matches!(
            remove_project_folder(&[base.clone()], &base),
            Err(RemoveFolderError::OutsideProjectDirs(_))
        ));
        assert!(other.exists());
        assert!(base.exists());
    }
}
