use crate::domain::{AgentState, ItemStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

/// Statuses older than this are treated as absent.
pub const STATUS_STALE_AFTER: Duration = Duration::minutes(2);
const STATUS_EXTENSION: &str = "status";

/// Agent status files written by hooks: `<cache_dir>/<session>.status`
/// containing `state:unix_ts`.
#[derive(Clone, Debug)]
pub struct StatusStore {
    cache_dir: PathBuf,
}

impl StatusStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn status_for(&self, session: &str, now: OffsetDateTime) -> Option<ItemStatus> {
        let path = self.cache_dir.join(format!("{session}.{STATUS_EXTENSION}"));
        let raw = fs::read_to_string(path).ok()?;
        parse_status(&raw, now)
    }

    pub fn statuses_for(
        &self,
        sessions: &[String],
        now: OffsetDateTime,
    ) -> BTreeMap<String, ItemStatus> {
        sessions
            .iter()
            .filter_map(|name| Some((name.clone(), self.status_for(name, now)?)))
            .collect()
    }

    /// Removes status files of sessions that no longer exist.
    pub fn cleanup_stale(&self, active: &[String]) {
        let active = active.iter().map(String::as_str).collect::<BTreeSet<_>>();
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(error) => {
                debug!(dir = %self.cache_dir.display(), %error, "status dir unreadable");
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(STATUS_EXTENSION) {
                continue;
            }
            let Some(session) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if active.contains(session) {
                continue;
            }
            if let Err(error) = fs::remove_file(&path) {
                warn!(path = %path.display(), %error, "failed to remove status file");
            }
        }
    }
}

pub fn parse_status(raw: &str, now: OffsetDateTime) -> Option<ItemStatus> {
    let (state, timestamp) = raw.trim().split_once(':')?;
    let state = AgentState::parse(state)?;
    let timestamp = timestamp.trim().parse::<i64>().ok()?;
    let updated_at = OffsetDateTime::from_unix_timestamp(timestamp).ok()?;
    if now - updated_at > STATUS_STALE_AFTER {
        return None;
    }
    Some(ItemStatus { state, updated_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn at(ts: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(ts).expect("timestamp")
    }

    #[test]
    fn parses_fresh_status() {
        let status = parse_status("working:1000\n", at(1060)).expect("status");
        assert_eq!(status.state, AgentState::Working);
        assert_eq!(status.updated_at, at(1000));
    }

    #[test]
    fn stale_or_malformed_status_is_absent() {
        assert_eq!(parse_status("waiting:1000", at(1000 + 121)), None);
        assert!(parse_status("waiting:1000", at(1000 + 120)).is_some());
        assert_eq!(parse_status("working", at(0)), None);
        assert_eq!(parse_status("sleeping:1000", at(1000)), None);
        assert_eq!(parse_status("new:abc", at(1000)), None);
    }

    #[test]
    fn reads_status_files_per_session() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("web.status"), "new:5000").expect("write");
        let store = StatusStore::new(dir.path().to_path_buf());

        let statuses = store.statuses_for(&["web".to_string(), "api".to_string()], at(5010));
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses["web"].state, AgentState::New);
    }

    #[test]
    fn cleanup_removes_only_inactive_status_files() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("web.status"), "new:1").expect("write");
        fs::write(dir.path().join("gone.status"), "new:1").expect("write");
        fs::write(dir.path().join("tsm.log"), "keep").expect("write");
        let store = StatusStore::new(dir.path().to_path_buf());

        store.cleanup_stale(&["web".to_string()]);
        assert!(dir.path().join("web.status").exists());
        assert!(!dir.path().join("gone.status").exists());
        assert!(dir.path().join("tsm.log").exists());
    }
}
