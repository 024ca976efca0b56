use crate::domain::Bookmark;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadBookmarksError {
    #[error("failed to read bookmarks: {0}")]
    Read(#[from] io::Error),

    #[error("failed to parse bookmarks: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SaveBookmarksError {
    #[error("failed to encode bookmarks: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write bookmarks: {0}")]
    Write(#[from] io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct BookmarksFile {
    version: u32,
    bookmarks: Vec<Bookmark>,
}

/// A missing file is an empty list.
pub fn load_bookmarks(path: &Path) -> Result<Vec<Bookmark>, LoadBookmarksError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error.into()),
    };
    let file: BookmarksFile = serde_json::from_str(&raw)?;
    Ok(file.bookmarks)
}

pub fn save_bookmarks(path: &Path, bookmarks: &[Bookmark]) -> Result<(), SaveBookmarksError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let tmp = path.with_extension("json.tmp");
    let file = BookmarksFile {
        version: 1,
        bookmarks: bookmarks.to_vec(),
    };
    let text = serde_json::to_string_pretty(&file)?;
    fs::write(&tmp, text)?;
    fs::rename(tmp, path)?;
    Ok(())
}
