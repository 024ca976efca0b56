use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

use super::cloned_repo_names;

const REPO_LIST_LIMIT: &str = "1000";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("gh CLI not found; install it from https://cli.github.com")]
    GhMissing,

    #[error("failed to run gh: {0}")]
    Spawn(io::Error),

    #[error("gh {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("failed to parse gh output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to create {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
}

/// Remote repositories the user can clone.
pub trait RepoSource: Send + Sync {
    /// `owner/repo` names not yet cloned.
    fn fetch_clone_candidates(&self) -> Result<Vec<String>, RepoError>;
    fn clone_repo(&self, name: &str, dest: &Path) -> Result<(), RepoError>;
}

#[derive(Clone, Debug)]
pub struct GhCli {
    clone_base_path: PathBuf,
}

impl GhCli {
    pub fn new(clone_base_path: PathBuf) -> Self {
        Self { clone_base_path }
    }

    fn run(&self, args: &[&str]) -> Result<String, RepoError> {
        debug!(?args, "gh");
        let output = Command::new("gh")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|error| match error.kind() {
                io::ErrorKind::NotFound => RepoError::GhMissing,
                _ => RepoError::Spawn(error),
            })?;
        if !output.status.success() {
            return Err(RepoError::Command {
                command: args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl RepoSource for GhCli {
    fn fetch_clone_candidates(&self) -> Result<Vec<String>, RepoError> {
        let out = self.run(&[
            "repo",
            "list",
            "--limit",
            REPO_LIST_LIMIT,
            "--json",
            "nameWithOwner",
        ])?;
        let listed = parse_repo_list(&out)?;
        let cloned = cloned_repo_names(&self.clone_base_path);
        Ok(filter_uncloned(listed, &cloned))
    }

    fn clone_repo(&self, name: &str, dest: &Path) -> Result<(), RepoError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| RepoError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let dest = dest.to_string_lossy();
        self.run(&["repo", "clone", name, &dest])?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoListEntry {
    name_with_owner: String,
}

fn parse_repo_list(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    let entries: Vec<RepoListEntry> = serde_json::from_str(raw)?;
    Ok(entries.into_iter().map(|e| e.name_with_owner).collect())
}

/// Sorted, deduplicated candidates minus the ones already on disk.
pub fn filter_uncloned(listed: Vec<String>, cloned: &BTreeSet<String>) -> Vec<String> {
    listed
        .into_iter()
        .filter(|name| !cloned.contains(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
