use crate::app::{AppEvent, ClonedRepo, Task, TaskOutcome};
use crate::domain::ItemStatus;
use crate::infra::{
    Config, RepoSource, SessionProvider, StatusStore, apply_layout, lazygit_popup_command,
    remove_project_folder, save_bookmarks, scan_directories,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub const TICK_INTERVAL: Duration = Duration::from_millis(300);

/// Everything a task may touch. Shared read-only across worker threads.
pub struct Collaborators {
    pub config: Config,
    pub current_session: String,
    pub bookmarks_path: PathBuf,
    pub sessions: Arc<dyn SessionProvider>,
    pub repos: Arc<dyn RepoSource>,
}

impl Collaborators {
    fn status_store(&self) -> Option<StatusStore> {
        self.config
            .claude_status_enabled
            .then(|| StatusStore::new(self.config.cache_dir.clone()))
    }

    fn statuses_for(&self, sessions: &[String]) -> BTreeMap<String, ItemStatus> {
        match self.status_store() {
            Some(store) => store.statuses_for(sessions, OffsetDateTime::now_utc()),
            None => BTreeMap::new(),
        }
    }
}

/// Runs each task on its own thread and posts the outcome back to the loop.
pub struct ThreadDispatcher {
    ctx: Arc<Collaborators>,
    tx: Sender<AppEvent>,
}

impl ThreadDispatcher {
    pub fn new(ctx: Arc<Collaborators>, tx: Sender<AppEvent>) -> Self {
        Self { ctx, tx }
    }

    pub fn dispatch(&self, task: Task) {
        debug!(task = task.label(), "dispatching");
        let ctx = Arc::clone(&self.ctx);
        let tx = self.tx.clone();
        thread::spawn(move || {
            if matches!(task, Task::Tick) {
                thread::sleep(TICK_INTERVAL);
            }
            let outcome = run_task(&ctx, task);
            let _ = tx.send(AppEvent::Task(outcome));
        });
    }
}

pub fn run_task(ctx: &Collaborators, task: Task) -> TaskOutcome {
    match task {
        Task::LoadSessions => load_sessions(ctx),
        Task::LoadWindows { session } => TaskOutcome::WindowsLoaded {
            result: ctx
                .sessions
                .list_windows(&session)
                .map_err(|error| error.to_string()),
            session,
        },
        Task::SwitchTo { target } => match ctx.sessions.switch_to(&target.address()) {
            Ok(()) => TaskOutcome::Switched,
            Err(error) => TaskOutcome::ActionFailed {
                error: format!("Failed to switch to {}: {error}", target.address()),
            },
        },
        Task::CreateSession { name, dir } => create_and_switch(ctx, &name, &dir),
        Task::OpenDirectory { session, dir } => open_session(ctx, &session, &dir),
        Task::Kill { target } => {
            let result = match target.window {
                Some(index) => ctx.sessions.kill_window(&target.session, index),
                None => ctx.sessions.kill_session(&target.session),
            };
            TaskOutcome::Killed {
                target,
                result: result.map_err(|error| error.to_string()),
            }
        }
        Task::RemoveFolder {
            generation,
            path,
            session,
        } => {
            if ctx.sessions.session_exists(&session) {
                if let Err(error) = ctx.sessions.kill_session(&session) {
                    warn!(session = %session, %error, "failed to kill session of removed folder");
                }
            }
            let result = remove_project_folder(&ctx.config.project_dirs, &path)
                .map_err(|error| error.to_string());
            TaskOutcome::FolderRemoved {
                generation,
                path,
                result,
            }
        }
        Task::ScanDirectories { generation } => TaskOutcome::DirectoriesScanned {
            generation,
            dirs: scan_directories(&ctx.config.project_dirs, ctx.config.project_depth),
        },
        Task::FetchCloneCandidates { generation } => TaskOutcome::CloneCandidatesLoaded {
            generation,
            result: ctx
                .repos
                .fetch_clone_candidates()
                .map_err(|error| error.to_string()),
        },
        Task::CloneRepo {
            generation,
            repo,
            dest,
            session,
        } => TaskOutcome::Cloned {
            generation,
            result: clone_repo(ctx, repo, dest, session),
        },
        Task::OpenClonedSession { session, dir } => {
            apply_layout(&ctx.config, &session, &dir);
            match ctx.sessions.switch_to(&session) {
                Ok(()) => TaskOutcome::Switched,
                Err(error) => TaskOutcome::ActionFailed {
                    error: format!("Failed to switch to {session}: {error}"),
                },
            }
        }
        Task::ResolveBookmarkPath { session } => TaskOutcome::BookmarkPathResolved {
            result: ctx
                .sessions
                .session_path(&session)
                .map_err(|error| error.to_string()),
            session,
        },
        Task::SaveBookmarks { bookmarks } => TaskOutcome::BookmarksSaved {
            result: save_bookmarks(&ctx.bookmarks_path, &bookmarks)
                .map_err(|error| error.to_string()),
        },
        Task::RefreshStatuses { sessions } => TaskOutcome::StatusesRefreshed {
            statuses: ctx.statuses_for(&sessions),
        },
        Task::OpenLazygit {
            session,
            picker_size,
        } => open_lazygit(ctx, &session, picker_size),
        Task::Tick => TaskOutcome::Tick,
    }
}

fn load_sessions(ctx: &Collaborators) -> TaskOutcome {
    let sessions = match ctx.sessions.list_sessions(&ctx.current_session) {
        Ok(sessions) => sessions,
        Err(error) => {
            warn!(%error, "failed to list sessions");
            return TaskOutcome::SessionsFailed {
                error: error.to_string(),
            };
        }
    };
    let names = sessions.iter().map(|s| s.name.clone()).collect::<Vec<_>>();
    if let Some(store) = ctx.status_store() {
        let mut active = names.clone();
        active.push(ctx.current_session.clone());
        store.cleanup_stale(&active);
    }
    TaskOutcome::SessionsLoaded {
        statuses: ctx.statuses_for(&names),
        sessions,
    }
}

fn create_and_switch(ctx: &Collaborators, name: &str, dir: &Path) -> TaskOutcome {
    if let Err(error) = ctx.sessions.create_session(name, dir) {
        return TaskOutcome::ActionFailed {
            error: format!("Failed to create {name}: {error}"),
        };
    }
    info!(session = name, dir = %dir.display(), "created session");
    apply_layout(&ctx.config, name, dir);
    match ctx.sessions.switch_to(name) {
        Ok(()) => TaskOutcome::Switched,
        Err(error) => TaskOutcome::ActionFailed {
            error: format!("Created {name} but failed to switch: {error}"),
        },
    }
}

fn open_session(ctx: &Collaborators, session: &str, dir: &Path) -> TaskOutcome {
    if !ctx.sessions.session_exists(session) {
        return create_and_switch(ctx, session, dir);
    }
    match ctx.sessions.switch_to(session) {
        Ok(()) => TaskOutcome::Switched,
        Err(error) => TaskOutcome::ActionFailed {
            error: format!("Failed to switch to {session}: {error}"),
        },
    }
}

fn open_lazygit(ctx: &Collaborators, session: &str, picker_size: (u16, u16)) -> TaskOutcome {
    let dir = match ctx.sessions.session_path(session) {
        Ok(dir) => dir,
        Err(error) => {
            warn!(session, %error, "no path for lazygit");
            return TaskOutcome::ActionFailed {
                error: format!("Could not get session path: {error}"),
            };
        }
    };
    let (width, height) = picker_size;
    let command = lazygit_popup_command(&ctx.config.lazygit_popup, &dir, width, height);
    info!(session, dir = %dir.display(), "opening lazygit");
    match ctx.sessions.run_in_background(&command) {
        Ok(()) => TaskOutcome::Switched,
        Err(error) => TaskOutcome::ActionFailed {
            error: format!("Failed to open lazygit: {error}"),
        },
    }
}

fn clone_repo(
    ctx: &Collaborators,
    repo: String,
    dest: PathBuf,
    session: String,
) -> Result<ClonedRepo, String> {
    ctx.repos
        .clone_repo(&repo, &dest)
        .map_err(|error| error.to_string())?;
    info!(repo = %repo, dest = %dest.display(), "cloned repository");
    ctx.sessions
        .create_session(&session, &dest)
        .map_err(|error| format!("Cloned but failed to create session: {error}"))?;
    Ok(ClonedRepo {
        repo,
        path: dest,
        session,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppCommand, AppModel, update};
    use crate::domain::{Bookmark, ItemKey, Session, Window};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use crate::infra::{RepoError, TmuxError, load_bookmarks};
    use std::fs;
    use std::sync::Mutex;
    use std::sync::mpsc::channel;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeTmux {
        sessions: Mutex<Vec<String>>,
        calls: Mutex<Vec<String>>,
        fail_switch: bool,
        fail_path: bool,
    }

    impl FakeTmux {
        fn with_sessions(names: &[&str]) -> Self {
            Self {
                sessions: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
                ..Self::default()
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().expect("calls").push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls").clone()
        }
    }

    impl SessionProvider for FakeTmux {
        fn list_sessions(&self, excluding: &str) -> Result<Vec<Session>, TmuxError> {
            Ok(self
                .sessions
                .lock()
                .expect("sessions")
                .iter()
                .filter(|name| name.as_str() != excluding)
                .map(|name| Session::new(name.clone(), OffsetDateTime::UNIX_EPOCH))
                .collect())
        }

        fn list_windows(&self, session: &str) -> Result<Vec<Window>, TmuxError> {
            self.record(format!("list-windows {session}"));
            Ok(vec![Window {
                index: 1,
                name: "shell".to_string(),
            }])
        }

        fn create_session(&self, name: &str, dir: &Path) -> Result<(), TmuxError> {
            self.record(format!("new-session {name} {}", dir.display()));
            self.sessions.lock().expect("sessions").push(name.to_string());
            Ok(())
        }

        fn kill_session(&self, name: &str) -> Result<(), TmuxError> {
            self.record(format!("kill-session {name}"));
            self.sessions.lock().expect("sessions").retain(|s| s != name);
            Ok(())
        }

        fn kill_window(&self, session: &str, index: u32) -> Result<(), TmuxError> {
            self.record(format!("kill-window {session}:{index}"));
            Ok(())
        }

        fn switch_to(&self, target: &str) -> Result<(), TmuxError> {
            self.record(format!("switch {target}"));
            if self.fail_switch {
                return Err(TmuxError::Command {
                    command: "switch-client".to_string(),
                    stderr: "no client".to_string(),
                });
            }
            Ok(())
        }

        fn session_exists(&self, name: &str) -> bool {
            self.sessions
                .lock()
                .expect("sessions")
                .iter()
                .any(|s| s == name)
        }

        fn session_path(&self, name: &str) -> Result<PathBuf, TmuxError> {
            if self.fail_path {
                return Err(TmuxError::Command {
                    command: "display-message".to_string(),
                    stderr: format!("can't find session: {name}"),
                });
            }
            Ok(PathBuf::from("/r").join(name))
        }

        fn current_session(&self) -> Result<String, TmuxError> {
            Ok("current".to_string())
        }

        fn run_in_background(&self, command: &str) -> Result<(), TmuxError> {
            self.record(format!("run-shell -b {command}"));
            Ok(())
        }
    }

    struct FakeRepos {
        fail_clone: bool,
    }

    impl RepoSource for FakeRepos {
        fn fetch_clone_candidates(&self) -> Result<Vec<String>, RepoError> {
            Ok(vec!["acme/api".to_string()])
        }

        fn clone_repo(&self, name: &str, _dest: &Path) -> Result<(), RepoError> {
            if self.fail_clone {
                return Err(RepoError::Command {
                    command: "repo clone".to_string(),
                    stderr: format!("{name} not found"),
                });
            }
            Ok(())
        }
    }

    fn collaborators(tmux: Arc<FakeTmux>, config: Config, bookmarks_path: PathBuf) -> Collaborators {
        Collaborators {
            config,
            current_session: "current".to_string(),
            bookmarks_path,
            sessions: tmux,
            repos: Arc::new(FakeRepos { fail_clone: false }),
        }
    }

    fn plain(tmux: Arc<FakeTmux>) -> Collaborators {
        collaborators(tmux, Config::default(), PathBuf::from("/nonexistent/bookmarks.json"))
    }

    #[test]
    fn load_sessions_excludes_current() {
        let tmux = Arc::new(FakeTmux::with_sessions(&["current", "web", "api"]));
        let outcome = run_task(&plain(tmux), Task::LoadSessions);
        let TaskOutcome::SessionsLoaded { sessions, statuses } = outcome else {
            panic!("expected SessionsLoaded");
        };
        let names = sessions.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["web", "api"]);
        assert!(statuses.is_empty());
    }

    #[test]
    fn load_sessions_reads_statuses_when_enabled() {
        let dir = tempdir().expect("tempdir");
        let now = OffsetDateTime::now_utc().unix_timestamp();
        fs::write(dir.path().join("web.status"), format!("working:{now}")).expect("write");
        fs::write(dir.path().join("gone.status"), format!("working:{now}")).expect("write");

        let mut config = Config::default();
        config.claude_status_enabled = true;
        config.cache_dir = dir.path().to_path_buf();
        let tmux = Arc::new(FakeTmux::with_sessions(&["web"]));
        let ctx = collaborators(tmux, config, dir.path().join("bookmarks.json"));

        let TaskOutcome::SessionsLoaded { statuses, .. } = run_task(&ctx, Task::LoadSessions)
        else {
            panic!("expected SessionsLoaded");
        };
        assert!(statuses.contains_key("web"));
        assert!(!dir.path().join("gone.status").exists());
    }

    #[test]
    fn open_directory_creates_missing_session_then_switches() {
        let tmux = Arc::new(FakeTmux::with_sessions(&["web"]));
        let ctx = plain(tmux.clone());

        let outcome = run_task(
            &ctx,
            Task::OpenDirectory {
                session: "web".to_string(),
                dir: PathBuf::from("/r/web"),
            },
        );
        assert_eq!(outcome, TaskOutcome::Switched);
        assert_eq!(tmux.calls(), vec!["switch web"]);

        let outcome = run_task(
            &ctx,
            Task::OpenDirectory {
                session: "api".to_string(),
                dir: PathBuf::from("/r/api"),
            },
        );
        assert_eq!(outcome, TaskOutcome::Switched);
        assert_eq!(
            tmux.calls()[1..],
            ["new-session api /r/api", "switch api"]
        );
    }

    #[test]
    fn failed_switch_is_reported_as_action_failure() {
        let tmux = Arc::new(FakeTmux {
            fail_switch: true,
            ..FakeTmux::default()
        });
        let outcome = run_task(
            &plain(tmux),
            Task::SwitchTo {
                target: ItemKey::window("web", 2),
            },
        );
        let TaskOutcome::ActionFailed { error } = outcome else {
            panic!("expected ActionFailed");
        };
        assert!(error.contains("web:2"));
    }

    #[test]
    fn kill_routes_windows_and_sessions() {
        let tmux = Arc::new(FakeTmux::with_sessions(&["web"]));
        let ctx = plain(tmux.clone());
        run_task(
            &ctx,
            Task::Kill {
                target: ItemKey::window("web", 3),
            },
        );
        run_task(
            &ctx,
            Task::Kill {
                target: ItemKey::session("web"),
            },
        );
        assert_eq!(tmux.calls(), vec!["kill-window web:3", "kill-session web"]);
    }

    #[test]
    fn remove_folder_kills_session_and_deletes_tree() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("acme/api");
        fs::create_dir_all(&target).expect("mkdir");

        let mut config = Config::default();
        config.project_dirs = vec![dir.path().to_path_buf()];
        let tmux = Arc::new(FakeTmux::with_sessions(&["acme-api"]));
        let ctx = collaborators(tmux.clone(), config, dir.path().join("bookmarks.json"));

        let outcome = run_task(
            &ctx,
            Task::RemoveFolder {
                generation: 4,
                path: target.clone(),
                session: "acme-api".to_string(),
            },
        );
        assert_eq!(
            outcome,
            TaskOutcome::FolderRemoved {
                generation: 4,
                path: target.clone(),
                result: Ok(()),
            }
        );
        assert!(!target.exists());
        assert_eq!(tmux.calls(), vec!["kill-session acme-api"]);
    }

    #[test]
    fn clone_creates_session_or_reports_failure() {
        let tmux = Arc::new(FakeTmux::default());
        let task = Task::CloneRepo {
            generation: 1,
            repo: "acme/api".to_string(),
            dest: PathBuf::from("/r/acme/api"),
            session: "acme-api".to_string(),
        };

        let ctx = plain(tmux.clone());
        let TaskOutcome::Cloned { result, .. } = run_task(&ctx, task.clone()) else {
            panic!("expected Cloned");
        };
        assert_eq!(result.expect("cloned").session, "acme-api");
        assert!(tmux.session_exists("acme-api"));

        let mut ctx = plain(Arc::new(FakeTmux::default()));
        ctx.repos = Arc::new(FakeRepos { fail_clone: true });
        let TaskOutcome::Cloned { result, .. } = run_task(&ctx, task) else {
            panic!("expected Cloned");
        };
        assert!(result.is_err_and(|error| error.contains("not found")));
    }

    #[test]
    fn save_bookmarks_writes_store() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bookmarks.json");
        let ctx = collaborators(Arc::new(FakeTmux::default()), Config::default(), path.clone());
        let bookmarks = vec![Bookmark {
            path: PathBuf::from("/r/acme/api"),
        }];

        let outcome = run_task(
            &ctx,
            Task::SaveBookmarks {
                bookmarks: bookmarks.clone(),
            },
        );
        assert_eq!(outcome, TaskOutcome::BookmarksSaved { result: Ok(()) });
        assert_eq!(load_bookmarks(&path).expect("load"), bookmarks);
    }

    #[test]
    fn rapid_bookmark_edits_leave_the_latest_list_on_disk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bookmarks.json");
        let ctx = collaborators(Arc::new(FakeTmux::default()), Config::default(), path.clone());
        let (tx, rx) = channel();
        let dispatcher = ThreadDispatcher::new(Arc::new(ctx), tx);

        let bookmarks = (0..6)
            .map(|i| Bookmark {
                path: PathBuf::from(format!("/r/acme/p{i}")),
            })
            .collect();
        let mut model = AppModel::new(Config::default(), bookmarks);
        let mut outstanding = 0usize;
        let run = |command: AppCommand, outstanding: &mut usize| {
            if let AppCommand::Dispatch(task) = command {
                *outstanding += 1;
                dispatcher.dispatch(task);
            }
        };

        let chord = |ch| AppEvent::Key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL));
        let (next, _) = update(model, chord('b'));
        model = next;
        for ch in "ddddduudduuuddd".chars() {
            let (next, command) = update(model, chord(ch));
            model = next;
            run(command, &mut outstanding);
            while let Ok(event) = rx.try_recv() {
                outstanding -= 1;
                let (next, command) = update(model, event);
                model = next;
                run(command, &mut outstanding);
            }
        }
        while outstanding > 0 {
            let event = rx.recv_timeout(Duration::from_secs(5)).expect("outcome");
            outstanding -= 1;
            let (next, command) = update(model, event);
            model = next;
            run(command, &mut outstanding);
        }

        assert_eq!(load_bookmarks(&path).expect("load"), model.bookmarks);
        assert_ne!(model.bookmarks[0].path, PathBuf::from("/r/acme/p0"));
    }

    #[test]
    fn lazygit_runs_detached_popup_in_session_dir() {
        let tmux = Arc::new(FakeTmux::default());
        let task = Task::OpenLazygit {
            session: "web".to_string(),
            picker_size: (100, 30),
        };
        assert_eq!(run_task(&plain(tmux.clone()), task.clone()), TaskOutcome::Switched);
        let calls = tmux.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("run-shell -b sleep 0.1 && tmux display-popup -w90% -h90%"));
        assert!(calls[0].contains("-d '/r/web' -E lazygit"));
        assert!(calls[0].ends_with("display-popup -w100 -h30 -B -E tsm"));

        let broken = Arc::new(FakeTmux {
            fail_path: true,
            ..FakeTmux::default()
        });
        let TaskOutcome::ActionFailed { error } = run_task(&plain(broken.clone()), task) else {
            panic!("expected ActionFailed");
        };
        assert!(error.starts_with("Could not get session path"));
        assert!(broken.calls().is_empty());
    }

    #[test]
    fn dispatcher_sends_one_outcome_per_task() {
        let (tx, rx) = channel();
        let ctx = Arc::new(plain(Arc::new(FakeTmux::with_sessions(&["web"]))));
        let dispatcher = ThreadDispatcher::new(ctx, tx);
        dispatcher.dispatch(Task::LoadWindows {
            session: "web".to_string(),
        });

        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("outcome");
        let AppEvent::Task(TaskOutcome::WindowsLoaded { session, result }) = event else {
            panic!("expected WindowsLoaded");
        };
        assert_eq!(session, "web");
        assert_eq!(result.expect("windows").len(), 1);
    }
}
