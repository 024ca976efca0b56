use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::OffsetDateTime;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub name: String,
    pub last_activity: OffsetDateTime,
    pub expanded: bool,
    /// Empty until the session is expanded for the first time.
    pub windows: Vec<Window>,
}

impl Session {
    pub fn new(name: impl Into<String>, last_activity: OffsetDateTime) -> Self {
        Self {
            name: name.into(),
            last_activity,
            expanded: false,
            windows: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Window {
    /// tmux window index; not necessarily contiguous.
    pub index: u32,
    pub name: String,
}

/// A row of the flattened session list. Indices point into the session
/// collection the list was built from and are only valid until the next
/// rebuild; use [`ItemKey`] to carry identity across rebuilds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Item {
    Session {
        session_index: usize,
    },
    Window {
        session_index: usize,
        window_index: usize,
    },
}

impl Item {
    pub fn session_index(self) -> usize {
        match self {
            Self::Session { session_index } | Self::Window { session_index, .. } => session_index,
        }
    }

    pub fn is_session(self) -> bool {
        matches!(self, Self::Session { .. })
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ItemKey {
    pub session: String,
    pub window: Option<u32>,
}

impl ItemKey {
    pub fn session(name: impl Into<String>) -> Self {
        Self {
            session: name.into(),
            window: None,
        }
    }

    pub fn window(session: impl Into<String>, index: u32) -> Self {
        Self {
            session: session.into(),
            window: Some(index),
        }
    }

    pub fn owning_session(&self) -> Self {
        Self::session(self.session.clone())
    }

    /// tmux target syntax: `session` or `session:index`.
    pub fn address(&self) -> String {
        match self.window {
            Some(index) => format!("{}:{index}", self.session),
            None => self.session.clone(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub path: PathBuf,
}

/// A directory offered by the directory and bookmark pickers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirectoryEntry {
    pub path: PathBuf,
    /// The last few path components, as shown and filtered on.
    pub display: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AgentState {
    New,
    Working,
    Waiting,
}

impl AgentState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "new" => Some(Self::New),
            "working" => Some(Self::Working),
            "waiting" => Some(Self::Waiting),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Working => "working",
            Self::Waiting => "waiting",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ItemStatus {
    pub state: AgentState,
    pub updated_at: OffsetDateTime,
}
