mod keys;
mod line_editor;
mod scroll_list;
mod tasks;

pub use keys::{KeyAction, classify};
pub use line_editor::LineEditor;
pub use scroll_list::{DEFAULT_HEIGHT, ScrollList};
pub use tasks::{ClonedRepo, Task, TaskOutcome};

use crate::domain::{
    Bookmark, DirectoryEntry, Item, ItemKey, ItemStatus, Session, Window, display_path,
    expand_exclusive, flatten_sessions, item_key, matches, position_of, sanitize_session_name,
    session_name_for_path,
};
use crate::infra::Config;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const CREATE_NAME_MAX_CHARS: usize = 50;
pub const SPINNER_FRAMES: u8 = 3;
/// About five seconds of 300 ms ticks.
pub const NOTICE_TTL_TICKS: u8 = 17;
/// Title, prompt, borders, notice, state line and two hint rows.
pub const SCREEN_CHROME_ROWS: u16 = 8;
pub const ALL_REPOS_CLONED: &str = "All repositories are already cloned!";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
    ttl_ticks: u8,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
            ttl_ticks: NOTICE_TTL_TICKS,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
            ttl_ticks: NOTICE_TTL_TICKS,
        }
    }
}

/// Target captured when a confirmation prompt opens.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PendingAction {
    KillSession {
        session: String,
    },
    KillWindow {
        session: String,
        index: u32,
        name: String,
    },
    RemoveFolder {
        path: PathBuf,
        display: String,
        session: String,
    },
}

impl PendingAction {
    pub fn prompt(&self) -> String {
        match self {
            Self::KillSession { session } => format!("Kill session \"{session}\"?"),
            Self::KillWindow {
                session,
                index,
                name,
            } => format!("Kill window {session}:{index} \"{name}\"?"),
            Self::RemoveFolder { display, .. } => {
                format!("Delete folder \"{display}\" and its session?")
            }
        }
    }

    fn kill_target(&self) -> Option<ItemKey> {
        match self {
            Self::KillSession { session } => Some(ItemKey::session(session.clone())),
            Self::KillWindow { session, index, .. } => {
                Some(ItemKey::window(session.clone(), *index))
            }
            Self::RemoveFolder { .. } => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DirectoryPicker {
    pub list: ScrollList<DirectoryEntry>,
    pub generation: u64,
    pub scanning: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClonePhase {
    Loading,
    Ready,
    Failed(String),
    Cloning { repo: String },
    Cloned(ClonedRepo),
}

#[derive(Clone, Debug)]
pub struct ClonePicker {
    pub list: ScrollList<String>,
    pub phase: ClonePhase,
    pub generation: u64,
}

#[derive(Clone, Debug, Default)]
pub enum Mode {
    #[default]
    Normal,
    ConfirmKill(PendingAction),
    Create(LineEditor),
    PickDirectory(DirectoryPicker),
    ConfirmRemoveFolder {
        picker: DirectoryPicker,
        pending: PendingAction,
    },
    CloneRepo(ClonePicker),
    Bookmarks(ScrollList<DirectoryEntry>),
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::ConfirmKill(_) => "confirm_kill",
            Self::Create(_) => "create",
            Self::PickDirectory(_) => "pick_directory",
            Self::ConfirmRemoveFolder { .. } => "confirm_remove_folder",
            Self::CloneRepo(_) => "clone_repo",
            Self::Bookmarks(_) => "bookmarks",
        }
    }
}

#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize { width: u16, height: u16 },
    /// The status directory changed on disk.
    StatusFilesChanged,
    Task(TaskOutcome),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppCommand {
    None,
    Quit,
    Dispatch(Task),
    Batch(Vec<Task>),
}

impl AppCommand {
    fn from_tasks(mut tasks: Vec<Task>) -> Self {
        match tasks.len() {
            0 => Self::None,
            1 => tasks.pop().map_or(Self::None, Self::Dispatch),
            _ => Self::Batch(tasks),
        }
    }
}

impl From<Option<Task>> for AppCommand {
    fn from(task: Option<Task>) -> Self {
        task.map_or(Self::None, Self::Dispatch)
    }
}

#[derive(Clone, Debug)]
pub struct AppModel {
    pub config: Config,
    pub sessions: Vec<Session>,
    pub items: ScrollList<Item>,
    /// Session-name filter of the main list.
    pub filter: String,
    pub statuses: BTreeMap<String, ItemStatus>,
    pub mode: Mode,
    pub bookmarks: Vec<Bookmark>,
    pub notice: Option<Notice>,
    pub terminal_size: (u16, u16),
    pub animation_frame: u8,
    pub sessions_loaded: bool,
    generation: u64,
    load_in_flight: bool,
    reload_queued: bool,
    save_in_flight: bool,
    save_queued: bool,
    refresh_in_flight: bool,
    refresh_queued: bool,
}

impl AppModel {
    pub fn new(config: Config, bookmarks: Vec<Bookmark>) -> Self {
        Self {
            config,
            sessions: Vec::new(),
            items: ScrollList::new(match_any_item),
            filter: String::new(),
            statuses: BTreeMap::new(),
            mode: Mode::Normal,
            bookmarks,
            notice: None,
            terminal_size: (0, 0),
            animation_frame: 0,
            sessions_loaded: false,
            generation: 0,
            load_in_flight: false,
            reload_queued: false,
            save_in_flight: false,
            save_queued: false,
            refresh_in_flight: false,
            refresh_queued: false,
        }
    }

    pub fn with_terminal_size(mut self, width: u16, height: u16) -> Self {
        self.terminal_size = (width, height);
        let rows = self.list_height();
        self.items.set_height(rows);
        match &mut self.mode {
            Mode::PickDirectory(picker) | Mode::ConfirmRemoveFolder { picker, .. } => {
                picker.list.set_height(rows);
            }
            Mode::CloneRepo(picker) => picker.list.set_height(rows),
            Mode::Bookmarks(list) => list.set_height(rows),
            Mode::Normal | Mode::ConfirmKill(_) | Mode::Create(_) => {}
        }
        self
    }

    pub fn with_notice(mut self, notice: Option<Notice>) -> Self {
        self.notice = notice;
        self
    }

    pub fn list_height(&self) -> usize {
        match self.terminal_size.1 {
            0 => DEFAULT_HEIGHT,
            rows => usize::from(rows.saturating_sub(SCREEN_CHROME_ROWS).max(1)),
        }
    }

    pub fn selected_key(&self) -> Option<ItemKey> {
        self.items
            .selected()
            .and_then(|item| item_key(&self.sessions, *item))
    }

    pub fn status_for(&self, session: &str) -> Option<&ItemStatus> {
        self.statuses.get(session)
    }

    pub fn session_names(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.name.clone()).collect()
    }

    pub fn directory_entry(&self, path: PathBuf) -> DirectoryEntry {
        DirectoryEntry {
            display: display_path(&path, self.config.project_depth),
            path,
        }
    }

    fn set_notice(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice::info(text));
    }

    fn set_error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice::error(text));
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// At most one load is outstanding; a request made meanwhile is folded
    /// into a single follow-up load.
    fn request_reload(&mut self) -> Option<Task> {
        if self.load_in_flight {
            debug!("reload already in flight; queueing");
            self.reload_queued = true;
            return None;
        }
        self.load_in_flight = true;
        Some(Task::LoadSessions)
    }

    fn finish_load(&mut self) -> Option<Task> {
        self.load_in_flight = false;
        if !self.reload_queued {
            return None;
        }
        self.reload_queued = false;
        self.request_reload()
    }

    /// Saves write the file in order: while one is outstanding, later edits
    /// only mark the list dirty and the latest list is written afterwards.
    fn request_save(&mut self) -> Option<Task> {
        if self.save_in_flight {
            debug!("bookmark save already in flight; queueing");
            self.save_queued = true;
            return None;
        }
        self.save_in_flight = true;
        Some(Task::SaveBookmarks {
            bookmarks: self.bookmarks.clone(),
        })
    }

    fn finish_save(&mut self) -> Option<Task> {
        self.save_in_flight = false;
        if !self.save_queued {
            return None;
        }
        self.save_queued = false;
        self.request_save()
    }

    fn request_status_refresh(&mut self) -> Option<Task> {
        if self.refresh_in_flight {
            debug!("status refresh already in flight; queueing");
            self.refresh_queued = true;
            return None;
        }
        self.refresh_in_flight = true;
        Some(Task::RefreshStatuses {
            sessions: self.session_names(),
        })
    }

    fn finish_status_refresh(&mut self) -> Option<Task> {
        self.refresh_in_flight = false;
        if !self.refresh_queued {
            return None;
        }
        self.refresh_queued = false;
        self.request_status_refresh()
    }

    fn rebuild_items(&mut self, preferred: Option<ItemKey>) {
        let items = flatten_sessions(&self.sessions, &self.filter);
        let position = preferred.and_then(|key| position_of(&self.sessions, &items, &key));
        self.items.set_items(items);
        if let Some(position) = position {
            self.items.set_cursor(position);
        }
    }

    fn bookmark_entries(&self) -> Vec<DirectoryEntry> {
        self.bookmarks
            .iter()
            .map(|bookmark| self.directory_entry(bookmark.path.clone()))
            .collect()
    }
}

fn match_any_item(_: &Item, _: &str) -> bool {
    true
}

fn match_entry(entry: &DirectoryEntry, filter: &str) -> bool {
    matches(&entry.display, filter)
}

fn match_repo(repo: &String, filter: &str) -> bool {
    matches(repo, filter)
}

/// Initial load plus the animation clock.
pub fn start(model: AppModel) -> (AppModel, AppCommand) {
    let mut model = model;
    let mut tasks = Vec::new();
    tasks.extend(model.request_reload());
    tasks.push(Task::Tick);
    (model, AppCommand::from_tasks(tasks))
}

pub fn update(model: AppModel, event: AppEvent) -> (AppModel, AppCommand) {
    match event {
        AppEvent::Key(key) => update_on_key(model, key),
        AppEvent::Resize { width, height } => {
            (model.with_terminal_size(width, height), AppCommand::None)
        }
        AppEvent::StatusFilesChanged => {
            let mut model = model;
            let command = AppCommand::from(model.request_status_refresh());
            (model, command)
        }
        AppEvent::Task(outcome) => update_on_outcome(model, outcome),
    }
}

fn update_on_key(model: AppModel, key: KeyEvent) -> (AppModel, AppCommand) {
    let mut model = model;

    if let Mode::Create(editor) = &mut model.mode {
        if edit_line(editor, key) {
            return (model, AppCommand::None);
        }
    }

    let Some(action) = classify(key) else {
        return (model, AppCommand::None);
    };
    if action == KeyAction::Quit {
        return (model, AppCommand::Quit);
    }

    match std::mem::take(&mut model.mode) {
        Mode::Normal => update_normal(model, action),
        Mode::ConfirmKill(pending) => update_confirm_kill(model, pending, action),
        Mode::Create(editor) => update_create(model, editor, action),
        Mode::PickDirectory(picker) => update_pick_directory(model, picker, action),
        Mode::ConfirmRemoveFolder { picker, pending } => {
            update_confirm_remove_folder(model, picker, pending, action)
        }
        Mode::CloneRepo(picker) => update_clone_repo(model, picker, action),
        Mode::Bookmarks(list) => update_bookmarks(model, list, action),
    }
}

fn edit_line(editor: &mut LineEditor, key: KeyEvent) -> bool {
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return false;
    }
    match key.code {
        KeyCode::Char(ch) => {
            editor.insert_char(ch);
        }
        KeyCode::Backspace => editor.backspace(),
        KeyCode::Delete => editor.delete_forward(),
        KeyCode::Left => editor.move_left(),
        KeyCode::Right => editor.move_right(),
        KeyCode::Home => editor.move_home(),
        KeyCode::End => editor.move_end(),
        _ => return false,
    }
    true
}

fn update_normal(model: AppModel, action: KeyAction) -> (AppModel, AppCommand) {
    let mut model = model;
    match action {
        KeyAction::Up => model.items.move_cursor(-1),
        KeyAction::Down => model.items.move_cursor(1),
        KeyAction::PageUp | KeyAction::MoveUp => model.items.page_up(),
        KeyAction::PageDown | KeyAction::MoveDown => model.items.page_down(),
        KeyAction::Expand => return expand_selected(model),
        KeyAction::Collapse => collapse_selected(&mut model),
        KeyAction::Select => {
            if let Some(target) = model.selected_key() {
                return switch_to(model, target);
            }
        }
        KeyAction::Kill => {
            if let Some(pending) = kill_pending_for_selection(&model) {
                model.mode = Mode::ConfirmKill(pending);
            }
        }
        KeyAction::Create => {
            if !model.filter.is_empty() {
                model.filter.clear();
                let preferred = model.selected_key();
                model.rebuild_items(preferred);
            }
            model.mode = Mode::Create(LineEditor::with_limit(CREATE_NAME_MAX_CHARS));
        }
        KeyAction::PickDirectory => return open_directory_picker(model),
        KeyAction::CloneRepo => return open_clone_picker(model),
        KeyAction::Bookmarks => {
            let mut list = ScrollList::with_items(match_entry, model.bookmark_entries());
            list.set_height(model.list_height());
            model.mode = Mode::Bookmarks(list);
        }
        KeyAction::AddBookmark => {
            if let Some(key) = model.selected_key() {
                return (
                    model,
                    AppCommand::Dispatch(Task::ResolveBookmarkPath {
                        session: key.session,
                    }),
                );
            }
        }
        KeyAction::Lazygit => {
            if let Some(key) = model.selected_key() {
                info!(session = %key.session, "opening lazygit");
                let task = Task::OpenLazygit {
                    session: key.session,
                    picker_size: model.terminal_size,
                };
                return (model, AppCommand::Dispatch(task));
            }
        }
        KeyAction::Cancel => {
            if model.filter.is_empty() {
                return (model, AppCommand::Quit);
            }
            let preferred = model.selected_key();
            model.filter.clear();
            model.rebuild_items(preferred);
        }
        KeyAction::Backspace => {
            let preferred = model.selected_key();
            if model.filter.pop().is_some() {
                model.rebuild_items(preferred);
            }
        }
        KeyAction::Jump(slot) if model.filter.is_empty() => return jump(model, slot),
        other => {
            if let Some(ch) = other.typed_char() {
                let preferred = model.selected_key();
                model.filter.push(ch);
                model.rebuild_items(preferred);
            }
        }
    }
    (model, AppCommand::None)
}

fn kill_pending_for_selection(model: &AppModel) -> Option<PendingAction> {
    match *model.items.selected()? {
        Item::Session { session_index } => {
            let session = model.sessions.get(session_index)?;
            Some(PendingAction::KillSession {
                session: session.name.clone(),
            })
        }
        Item::Window {
            session_index,
            window_index,
        } => {
            let session = model.sessions.get(session_index)?;
            let window = session.windows.get(window_index)?;
            Some(PendingAction::KillWindow {
                session: session.name.clone(),
                index: window.index,
                name: window.name.clone(),
            })
        }
    }
}

fn switch_to(model: AppModel, target: ItemKey) -> (AppModel, AppCommand) {
    let mut model = model;
    info!(addr = %target.address(), "switching client");
    model.set_notice(format!("Switching to {}…", target.address()));
    (model, AppCommand::Dispatch(Task::SwitchTo { target }))
}

/// Digit N: window N of the selected expanded session, else the Nth session.
fn jump(model: AppModel, slot: u8) -> (AppModel, AppCommand) {
    let selected_session = model
        .items
        .selected()
        .and_then(|item| model.sessions.get(item.session_index()));
    if let Some(session) = selected_session.filter(|s| s.expanded) {
        if let Some(window) = session
            .windows
            .iter()
            .find(|window| window.index == u32::from(slot))
        {
            let target = ItemKey::window(session.name.clone(), window.index);
            return switch_to(model, target);
        }
    }

    let position = usize::from(slot).saturating_sub(1);
    match model.sessions.get(position) {
        Some(session) => {
            let target = ItemKey::session(session.name.clone());
            switch_to(model, target)
        }
        None => (model, AppCommand::None),
    }
}

fn expand_selected(model: AppModel) -> (AppModel, AppCommand) {
    let mut model = model;
    let Some(Item::Session { session_index }) = model.items.selected().copied() else {
        return (model, AppCommand::None);
    };
    let Some(session) = model.sessions.get(session_index) else {
        return (model, AppCommand::None);
    };
    if session.windows.is_empty() {
        let task = Task::LoadWindows {
            session: session.name.clone(),
        };
        return (model, AppCommand::Dispatch(task));
    }

    let key = ItemKey::session(session.name.clone());
    expand_exclusive(&mut model.sessions, session_index);
    model.rebuild_items(Some(key));
    (model, AppCommand::None)
}

fn collapse_selected(model: &mut AppModel) {
    let Some(item) = model.items.selected().copied() else {
        return;
    };
    let Some(session) = model.sessions.get_mut(item.session_index()) else {
        return;
    };
    session.expanded = false;
    let key = ItemKey::session(session.name.clone());
    model.rebuild_items(Some(key));
}

fn update_confirm_kill(
    model: AppModel,
    pending: PendingAction,
    action: KeyAction,
) -> (AppModel, AppCommand) {
    let mut model = model;
    match action {
        KeyAction::Kill | KeyAction::Confirm => match pending.kill_target() {
            Some(target) => {
                info!(addr = %target.address(), "killing");
                (model, AppCommand::Dispatch(Task::Kill { target }))
            }
            None => (model, AppCommand::None),
        },
        KeyAction::Cancel => (model, AppCommand::None),
        _ => {
            model.mode = Mode::ConfirmKill(pending);
            (model, AppCommand::None)
        }
    }
}

fn update_create(
    model: AppModel,
    editor: LineEditor,
    action: KeyAction,
) -> (AppModel, AppCommand) {
    let mut model = model;
    match action {
        KeyAction::Cancel => (model, AppCommand::None),
        KeyAction::Select => {
            let name = editor.text.trim();
            if name.is_empty() {
                model.set_error("Session name cannot be empty");
                model.mode = Mode::Create(editor);
                return (model, AppCommand::None);
            }
            let name = sanitize_session_name(name);
            info!(session = %name, "creating session");
            model.set_notice(format!("Creating {name}…"));
            let task = Task::CreateSession {
                name,
                dir: model.config.default_session_dir.clone(),
            };
            (model, AppCommand::Dispatch(task))
        }
        _ => {
            model.mode = Mode::Create(editor);
            (model, AppCommand::None)
        }
    }
}

fn open_directory_picker(model: AppModel) -> (AppModel, AppCommand) {
    let mut model = model;
    let generation = model.next_generation();
    let mut list = ScrollList::new(match_entry);
    list.set_height(model.list_height());
    model.mode = Mode::PickDirectory(DirectoryPicker {
        list,
        generation,
        scanning: true,
    });
    (
        model,
        AppCommand::Dispatch(Task::ScanDirectories { generation }),
    )
}

fn open_directory(model: AppModel, entry: DirectoryEntry) -> (AppModel, AppCommand) {
    let mut model = model;
    let session = session_name_for_path(&entry.path, model.config.project_depth);
    info!(session = %session, dir = %entry.path.display(), "opening directory");
    model.set_notice(format!("Opening {session}…"));
    model.mode = Mode::Normal;
    let task = Task::OpenDirectory {
        session,
        dir: entry.path,
    };
    (model, AppCommand::Dispatch(task))
}

fn update_pick_directory(
    model: AppModel,
    picker: DirectoryPicker,
    action: KeyAction,
) -> (AppModel, AppCommand) {
    let mut model = model;
    let mut picker = picker;
    match action {
        KeyAction::Up => picker.list.move_cursor(-1),
        KeyAction::Down => picker.list.move_cursor(1),
        KeyAction::PageUp | KeyAction::MoveUp => picker.list.page_up(),
        KeyAction::PageDown | KeyAction::MoveDown => picker.list.page_down(),
        KeyAction::Cancel => {
            if !picker.list.clear_filter() {
                return (model, AppCommand::None);
            }
        }
        KeyAction::Select => {
            if let Some(entry) = picker.list.selected().cloned() {
                return open_directory(model, entry);
            }
        }
        KeyAction::Kill => {
            if let Some(entry) = picker.list.selected().cloned() {
                let pending = PendingAction::RemoveFolder {
                    session: session_name_for_path(&entry.path, model.config.project_depth),
                    path: entry.path,
                    display: entry.display,
                };
                model.mode = Mode::ConfirmRemoveFolder { picker, pending };
                return (model, AppCommand::None);
            }
        }
        KeyAction::AddBookmark => {
            if let Some(entry) = picker.list.selected().cloned() {
                let command = add_bookmark(&mut model, entry.path);
                model.mode = Mode::PickDirectory(picker);
                return (model, command);
            }
        }
        KeyAction::Backspace => {
            picker.list.pop_filter_char();
        }
        other => {
            if let Some(ch) = other.typed_char() {
                picker.list.push_filter_char(ch);
            }
        }
    }
    model.mode = Mode::PickDirectory(picker);
    (model, AppCommand::None)
}

fn update_confirm_remove_folder(
    model: AppModel,
    picker: DirectoryPicker,
    pending: PendingAction,
    action: KeyAction,
) -> (AppModel, AppCommand) {
    let mut model = model;
    match (action, pending) {
        (
            KeyAction::Kill | KeyAction::Confirm,
            PendingAction::RemoveFolder {
                path,
                display,
                session,
            },
        ) => {
            info!(dir = %path.display(), "removing folder");
            model.set_notice(format!("Removing {display}…"));
            let task = Task::RemoveFolder {
                generation: picker.generation,
                path,
                session,
            };
            model.mode = Mode::PickDirectory(picker);
            (model, AppCommand::Dispatch(task))
        }
        (KeyAction::Kill | KeyAction::Confirm | KeyAction::Cancel, _) => {
            model.mode = Mode::PickDirectory(picker);
            (model, AppCommand::None)
        }
        (_, pending) => {
            model.mode = Mode::ConfirmRemoveFolder { picker, pending };
            (model, AppCommand::None)
        }
    }
}

fn open_clone_picker(model: AppModel) -> (AppModel, AppCommand) {
    let mut model = model;
    let generation = model.next_generation();
    let mut list = ScrollList::new(match_repo);
    list.set_height(model.list_height());
    model.mode = Mode::CloneRepo(ClonePicker {
        list,
        phase: ClonePhase::Loading,
        generation,
    });
    (
        model,
        AppCommand::Dispatch(Task::FetchCloneCandidates { generation }),
    )
}

fn update_clone_repo(
    model: AppModel,
    picker: ClonePicker,
    action: KeyAction,
) -> (AppModel, AppCommand) {
    let mut model = model;
    if let ClonePhase::Cloned(cloned) = picker.phase.clone() {
        return match action {
            KeyAction::Select => {
                info!(session = %cloned.session, "opening cloned repository");
                model.set_notice(format!("Opening {}…", cloned.session));
                let task = Task::OpenClonedSession {
                    session: cloned.session,
                    dir: cloned.path,
                };
                (model, AppCommand::Dispatch(task))
            }
            KeyAction::Cancel => {
                let command = AppCommand::from(model.request_reload());
                (model, command)
            }
            _ => {
                model.mode = Mode::CloneRepo(picker);
                (model, AppCommand::None)
            }
        };
    }
    if picker.phase == ClonePhase::Ready {
        return update_clone_selection(model, picker, action);
    }

    if action == KeyAction::Cancel {
        if matches!(picker.phase, ClonePhase::Loading | ClonePhase::Cloning { .. }) {
            debug!(generation = picker.generation, "leaving clone picker with work in flight");
        }
        return (model, AppCommand::None);
    }
    model.mode = Mode::CloneRepo(picker);
    (model, AppCommand::None)
}

fn update_clone_selection(
    model: AppModel,
    picker: ClonePicker,
    action: KeyAction,
) -> (AppModel, AppCommand) {
    let mut model = model;
    let mut picker = picker;
    match action {
        KeyAction::Up => picker.list.move_cursor(-1),
        KeyAction::Down => picker.list.move_cursor(1),
        KeyAction::PageUp | KeyAction::MoveUp => picker.list.page_up(),
        KeyAction::PageDown | KeyAction::MoveDown => picker.list.page_down(),
        KeyAction::Cancel => {
            if !picker.list.clear_filter() {
                return (model, AppCommand::None);
            }
        }
        KeyAction::Select => {
            if let Some(repo) = picker.list.selected().cloned() {
                info!(repo = %repo, "cloning repository");
                let task = Task::CloneRepo {
                    generation: picker.generation,
                    dest: model.config.clone_base_path.join(&repo),
                    session: sanitize_session_name(&repo),
                    repo: repo.clone(),
                };
                picker.phase = ClonePhase::Cloning { repo };
                model.mode = Mode::CloneRepo(picker);
                return (model, AppCommand::Dispatch(task));
            }
        }
        KeyAction::Backspace => {
            picker.list.pop_filter_char();
        }
        other => {
            if let Some(ch) = other.typed_char() {
                picker.list.push_filter_char(ch);
            }
        }
    }
    model.mode = Mode::CloneRepo(picker);
    (model, AppCommand::None)
}

fn update_bookmarks(
    model: AppModel,
    list: ScrollList<DirectoryEntry>,
    action: KeyAction,
) -> (AppModel, AppCommand) {
    let mut model = model;
    let mut list = list;
    let mut command = AppCommand::None;
    match action {
        KeyAction::Up => list.move_cursor(-1),
        KeyAction::Down => list.move_cursor(1),
        KeyAction::PageUp => list.page_up(),
        KeyAction::PageDown => list.page_down(),
        KeyAction::Cancel => {
            if !list.clear_filter() {
                return (model, AppCommand::None);
            }
        }
        KeyAction::Select => {
            if let Some(entry) = list.selected().cloned() {
                return open_directory(model, entry);
            }
        }
        KeyAction::Jump(slot) if list.filter().is_empty() => {
            let entry = list.items().get(usize::from(slot) - 1).cloned();
            if let Some(entry) = entry {
                return open_directory(model, entry);
            }
        }
        KeyAction::Kill => {
            if let Some(entry) = list.remove_selected() {
                info!(dir = %entry.path.display(), "removing bookmark");
                model.set_notice(format!("Removed bookmark {}", entry.display));
                command = store_bookmarks(&mut model, &list);
            }
        }
        KeyAction::MoveUp => {
            if list.move_item(-1) {
                command = store_bookmarks(&mut model, &list);
            }
        }
        KeyAction::MoveDown => {
            if list.move_item(1) {
                command = store_bookmarks(&mut model, &list);
            }
        }
        KeyAction::Backspace => {
            list.pop_filter_char();
        }
        other => {
            if let Some(ch) = other.typed_char() {
                list.push_filter_char(ch);
            }
        }
    }
    model.mode = Mode::Bookmarks(list);
    (model, command)
}

fn store_bookmarks(model: &mut AppModel, list: &ScrollList<DirectoryEntry>) -> AppCommand {
    model.bookmarks = list
        .items()
        .iter()
        .map(|entry| Bookmark {
            path: entry.path.clone(),
        })
        .collect();
    AppCommand::from(model.request_save())
}

fn add_bookmark(model: &mut AppModel, path: PathBuf) -> AppCommand {
    let display = display_path(&path, model.config.project_depth);
    if model.bookmarks.iter().any(|bookmark| bookmark.path == path) {
        model.set_notice(format!("{display} is already bookmarked"));
        return AppCommand::None;
    }
    info!(dir = %path.display(), "adding bookmark");
    model.bookmarks.push(Bookmark { path });
    let slot = model.bookmarks.len();
    if slot <= 9 {
        model.set_notice(format!("Bookmarked {display} as {slot}"));
    } else {
        model.set_notice(format!("Bookmarked {display}"));
    }
    AppCommand::from(model.request_save())
}

fn update_on_outcome(model: AppModel, outcome: TaskOutcome) -> (AppModel, AppCommand) {
    let mut model = model;
    debug!(outcome = outcome.label(), mode = model.mode.label(), "task finished");
    match outcome {
        TaskOutcome::SessionsLoaded { sessions, statuses } => {
            let preferred = model.selected_key();
            model.sessions = sessions;
            model.statuses = statuses;
            model.sessions_loaded = true;
            model.rebuild_items(preferred);
            let command = AppCommand::from(model.finish_load());
            (model, command)
        }
        TaskOutcome::SessionsFailed { error } => {
            model.set_error(format!("Failed to load sessions: {error}"));
            let command = AppCommand::from(model.finish_load());
            (model, command)
        }
        TaskOutcome::WindowsLoaded { session, result } => {
            apply_windows(&mut model, &session, result);
            (model, AppCommand::None)
        }
        TaskOutcome::Switched => (model, AppCommand::Quit),
        TaskOutcome::ActionFailed { error } => {
            model.set_error(error);
            let command = AppCommand::from(model.request_reload());
            (model, command)
        }
        TaskOutcome::Killed { target, result } => {
            match result {
                Ok(()) => model.set_notice(format!("Killed {}", target.address())),
                Err(error) => {
                    model.set_error(format!("Failed to kill {}: {error}", target.address()))
                }
            }
            let command = AppCommand::from(model.request_reload());
            (model, command)
        }
        TaskOutcome::DirectoriesScanned { generation, dirs } => {
            apply_directories(&mut model, generation, dirs);
            (model, AppCommand::None)
        }
        TaskOutcome::FolderRemoved {
            generation,
            path,
            result,
        } => apply_folder_removed(model, generation, &path, result),
        TaskOutcome::CloneCandidatesLoaded { generation, result } => {
            apply_clone_candidates(&mut model, generation, result);
            (model, AppCommand::None)
        }
        TaskOutcome::Cloned { generation, result } => apply_cloned(model, generation, result),
        TaskOutcome::BookmarkPathResolved { session, result } => match result {
            Ok(path) => {
                let command = add_bookmark(&mut model, path);
                (model, command)
            }
            Err(error) => {
                model.set_error(format!("Cannot bookmark {session}: {error}"));
                (model, AppCommand::None)
            }
        },
        TaskOutcome::BookmarksSaved { result } => {
            if let Err(error) = result {
                model.set_error(format!("Failed to save bookmarks: {error}"));
            }
            let command = AppCommand::from(model.finish_save());
            (model, command)
        }
        TaskOutcome::StatusesRefreshed { statuses } => {
            model.statuses = statuses;
            let command = AppCommand::from(model.finish_status_refresh());
            (model, command)
        }
        TaskOutcome::Tick => {
            model.animation_frame = (model.animation_frame + 1) % SPINNER_FRAMES;
            if let Some(notice) = &mut model.notice {
                notice.ttl_ticks = notice.ttl_ticks.saturating_sub(1);
                if notice.ttl_ticks == 0 {
                    model.notice = None;
                }
            }
            (model, AppCommand::Dispatch(Task::Tick))
        }
    }
}

fn apply_windows(model: &mut AppModel, session: &str, result: Result<Vec<Window>, String>) {
    let Some(index) = model.sessions.iter().position(|s| s.name == session) else {
        debug!(session, "windows arrived for a session that is gone");
        return;
    };
    match result {
        Ok(windows) => {
            let preferred = model.selected_key();
            let has_windows = !windows.is_empty();
            if let Some(target) = model.sessions.get_mut(index) {
                target.windows = windows;
            }
            if has_windows {
                expand_exclusive(&mut model.sessions, index);
            }
            model.rebuild_items(preferred);
        }
        Err(error) => model.set_error(format!("Failed to load windows for {session}: {error}")),
    }
}

fn apply_directories(model: &mut AppModel, generation: u64, dirs: Vec<PathBuf>) {
    let depth = model.config.project_depth;
    match &mut model.mode {
        Mode::PickDirectory(picker) | Mode::ConfirmRemoveFolder { picker, .. }
            if picker.generation == generation =>
        {
            let entries = dirs
                .into_iter()
                .map(|path| DirectoryEntry {
                    display: display_path(&path, depth),
                    path,
                })
                .collect();
            picker.list.set_items(entries);
            picker.scanning = false;
        }
        _ => debug!(generation, "dropping stale directory scan"),
    }
}

fn apply_folder_removed(
    model: AppModel,
    generation: u64,
    path: &Path,
    result: Result<(), String>,
) -> (AppModel, AppCommand) {
    let mut model = model;
    let display = display_path(path, model.config.project_depth);
    let removed = result.is_ok();
    match result {
        Ok(()) => model.set_notice(format!("Removed {display}")),
        Err(error) => model.set_error(format!("Failed to remove {display}: {error}")),
    }

    let mut tasks = Vec::new();
    if removed {
        if let Mode::PickDirectory(picker) | Mode::ConfirmRemoveFolder { picker, .. } =
            &mut model.mode
        {
            if picker.generation == generation {
                picker.scanning = true;
                tasks.push(Task::ScanDirectories { generation });
            }
        }
        tasks.extend(model.request_reload());
    }
    (model, AppCommand::from_tasks(tasks))
}

fn apply_clone_candidates(
    model: &mut AppModel,
    generation: u64,
    result: Result<Vec<String>, String>,
) {
    match &mut model.mode {
        Mode::CloneRepo(picker)
            if picker.generation == generation && picker.phase == ClonePhase::Loading =>
        {
            picker.phase = match result {
                Ok(repos) if repos.is_empty() => ClonePhase::Failed(ALL_REPOS_CLONED.to_string()),
                Ok(repos) => {
                    picker.list.set_items(repos);
                    ClonePhase::Ready
                }
                Err(error) => ClonePhase::Failed(error),
            };
        }
        _ => debug!(generation, "dropping stale clone listing"),
    }
}

fn apply_cloned(
    model: AppModel,
    generation: u64,
    result: Result<ClonedRepo, String>,
) -> (AppModel, AppCommand) {
    let mut model = model;
    if let Mode::CloneRepo(picker) = &mut model.mode {
        if picker.generation == generation && matches!(picker.phase, ClonePhase::Cloning { .. }) {
            picker.phase = match result {
                Ok(cloned) => ClonePhase::Cloned(cloned),
                Err(error) => ClonePhase::Failed(error),
            };
            return (model, AppCommand::None);
        }
    }

    debug!(generation, "clone finished after its picker closed");
    match result {
        Ok(cloned) => {
            model.set_notice(format!("Cloned {}", cloned.repo));
            let command = AppCommand::from(model.request_reload());
            (model, command)
        }
        Err(error) => {
            model.set_error(format!("Clone failed: {error}"));
            (model, AppCommand::None)
        }
    }
}
