use crate::domain::{Bookmark, ItemKey, ItemStatus, Session, Window};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Side-effecting work requested by [`super::update`]. Every task carries
/// owned copies of its inputs and produces exactly one [`TaskOutcome`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Task {
    LoadSessions,
    LoadWindows {
        session: String,
    },
    SwitchTo {
        target: ItemKey,
    },
    CreateSession {
        name: String,
        dir: PathBuf,
    },
    /// Switch to `session`, creating it in `dir` first when missing.
    OpenDirectory {
        session: String,
        dir: PathBuf,
    },
    Kill {
        target: ItemKey,
    },
    RemoveFolder {
        generation: u64,
        path: PathBuf,
        session: String,
    },
    ScanDirectories {
        generation: u64,
    },
    FetchCloneCandidates {
        generation: u64,
    },
    CloneRepo {
        generation: u64,
        repo: String,
        dest: PathBuf,
        session: String,
    },
    OpenClonedSession {
        session: String,
        dir: PathBuf,
    },
    ResolveBookmarkPath {
        session: String,
    },
    SaveBookmarks {
        bookmarks: Vec<Bookmark>,
    },
    RefreshStatuses {
        sessions: Vec<String>,
    },
    /// Hand the client over to a lazygit popup in the session's directory;
    /// the picker reopens at `picker_size` afterwards.
    OpenLazygit {
        session: String,
        picker_size: (u16, u16),
    },
    Tick,
}

impl Task {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LoadSessions => "load_sessions",
            Self::LoadWindows { .. } => "load_windows",
            Self::SwitchTo { .. } => "switch_to",
            Self::CreateSession { .. } => "create_session",
            Self::OpenDirectory { .. } => "open_directory",
            Self::Kill { .. } => "kill",
            Self::RemoveFolder { .. } => "remove_folder",
            Self::ScanDirectories { .. } => "scan_directories",
            Self::FetchCloneCandidates { .. } => "fetch_clone_candidates",
            Self::CloneRepo { .. } => "clone_repo",
            Self::OpenClonedSession { .. } => "open_cloned_session",
            Self::ResolveBookmarkPath { .. } => "resolve_bookmark_path",
            Self::SaveBookmarks { .. } => "save_bookmarks",
            Self::RefreshStatuses { .. } => "refresh_statuses",
            Self::OpenLazygit { .. } => "open_lazygit",
            Self::Tick => "tick",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClonedRepo {
    pub repo: String,
    pub path: PathBuf,
    pub session: String,
}

/// Collaborator errors arrive as display strings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskOutcome {
    SessionsLoaded {
        sessions: Vec<Session>,
        statuses: BTreeMap<String, ItemStatus>,
    },
    SessionsFailed {
        error: String,
    },
    WindowsLoaded {
        session: String,
        result: Result<Vec<Window>, String>,
    },
    /// The client switched away; the picker is done.
    Switched,
    ActionFailed {
        error: String,
    },
    Killed {
        target: ItemKey,
        result: Result<(), String>,
    },
    DirectoriesScanned {
        generation: u64,
        dirs: Vec<PathBuf>,
    },
    FolderRemoved {
        generation: u64,
        path: PathBuf,
        result: Result<(), String>,
    },
    CloneCandidatesLoaded {
        generation: u64,
        result: Result<Vec<String>, String>,
    },
    Cloned {
        generation: u64,
        result: Result<ClonedRepo, String>,
    },
    BookmarkPathResolved {
        session: String,
        result: Result<PathBuf, String>,
    },
    BookmarksSaved {
        result: Result<(), String>,
    },
    StatusesRefreshed {
        statuses: BTreeMap<String, ItemStatus>,
    },
    Tick,
}

impl TaskOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SessionsLoaded { .. } => "sessions_loaded",
            Self::SessionsFailed { .. } => "sessions_failed",
            Self::WindowsLoaded { .. } => "windows_loaded",
            Self::Switched => "switched",
            Self::ActionFailed { .. } => "action_failed",
            Self::Killed { .. } => "killed",
            Self::DirectoriesScanned { .. } => "directories_scanned",
            Self::FolderRemoved { .. } => "folder_removed",
            Self::CloneCandidatesLoaded { .. } => "clone_candidates_loaded",
            Self::Cloned { .. } => "cloned",
            Self::BookmarkPathResolved { .. } => "bookmark_path_resolved",
            Self::BookmarksSaved { .. } => "bookmarks_saved",
            Self::StatusesRefreshed { .. } => "statuses_refreshed",
            Self::Tick => "tick",
        }
    }
}
