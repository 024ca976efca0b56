mod app;
mod cli;
mod dispatch;
mod domain;
mod infra;
mod ui;

use crate::app::{AppCommand, AppEvent, AppModel, Notice};
use crate::cli::CliInvocation;
use crate::dispatch::{Collaborators, ThreadDispatcher};
use crate::infra::{
    Config, GhCli, InitConfigError, LoadBookmarksError, LoadConfigError, ResolveConfigPathError,
    SessionProvider, StatusDirWatcher, TmuxClient, TmuxError, WatchSignal, bookmarks_path,
    init_config, init_logging, inside_tmux, load_bookmarks, load_config, resolve_config_path,
    watch_status_dir,
};
use crossterm::event::{
    self, Event, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::terminal::size as terminal_size;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{ExecutableCommand, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    App(#[from] crate::app::AppError),

    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),

    #[error(transparent)]
    ConfigPath(#[from] ResolveConfigPathError),

    #[error(transparent)]
    LoadConfig(#[from] LoadConfigError),

    #[error(transparent)]
    InitConfig(#[from] InitConfigError),

    #[error(transparent)]
    LoadBookmarks(#[from] LoadBookmarksError),

    #[error(transparent)]
    Tmux(#[from] TmuxError),

    #[error("tsm must be run inside a tmux session")]
    NotInTmux,
}

fn main() {
    if let Err(error) = run_main() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{error}");
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match crate::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Init => {
            let path = resolve_config_path(process_env)?;
            init_config(&path)?;
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "Wrote {}", path.display());
            Ok(())
        }
        CliInvocation::TmuxBindings => {
            let mut out = io::stdout().lock();
            let _ = write!(out, "{}", crate::cli::tmux_bindings());
            Ok(())
        }
        CliInvocation::Bookmark { slot } => {
            let config_path = resolve_config_path(process_env)?;
            let config = load_config(&config_path, process_env)?;
            let _log_guard = init_logging(&config.cache_dir).ok();
            let bookmarks = load_bookmarks(&bookmarks_path(&config_path))?;
            crate::cli::run_bookmark(slot, &config, &bookmarks, &TmuxClient::default())?;
            Ok(())
        }
        CliInvocation::Tui => run_tui(),
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn print_help() {
    let text = format!(
        "{name} - switch between tmux sessions\n\nUSAGE:\n  {name}                  Start the picker (inside tmux)\n  {name} init             Write a default config file\n  {name} bookmark N       Open bookmark slot N (1-9) without the picker\n  {name} tmux-bindings    Print tmux key bindings for bookmark slots\n  {name} --help | --version\n\nKEYS:\n  Up/Ctrl-k Down/Ctrl-j   Move          PgUp/Ctrl-u PgDn/Ctrl-d  Page\n  Ctrl-l / Ctrl-h         Expand / collapse windows\n  Enter                   Switch        1-9      Jump to item or window\n  Ctrl-x                  Kill          Ctrl-n   New session\n  Ctrl-p                  Directories   Ctrl-r   Clone repository\n  Ctrl-b                  Bookmarks     Ctrl-a   Bookmark session\n  Ctrl-g                  Lazygit popup for the selected session\n  Esc                     Clear filter, then quit\n\nENV:\n  TSM_CONFIG              Config file (default: ~/.config/tsm/config.toml)\n  TSM_LOG                 Log filter (default: info), written to <cache_dir>/tsm.log\n  TMUX_LAYOUT             Layout script name\n  TMUX_LAYOUTS_DIR        Layout script directory\n  TMUX_SESSION_PICKER_CLAUDE_STATUS  Set to 1 to show agent status badges\n",
        name = env!("CARGO_PKG_NAME")
    );
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}

fn run_tui() -> Result<(), MainError> {
    if !inside_tmux() {
        return Err(MainError::NotInTmux);
    }
    let config_path = resolve_config_path(process_env)?;
    let config = load_config(&config_path, process_env)?;
    let _log_guard = init_logging(&config.cache_dir).ok();
    info!(config = %config_path.display(), "starting");

    let bookmarks_path = bookmarks_path(&config_path);
    let (bookmarks, notice) = match load_bookmarks(&bookmarks_path) {
        Ok(bookmarks) => (bookmarks, None),
        Err(error) => {
            warn!(%error, "bookmarks unavailable");
            (Vec::new(), Some(Notice::error(format!("Bookmarks: {error}"))))
        }
    };

    let tmux = Arc::new(TmuxClient::default());
    let current_session = tmux.current_session()?;
    let watcher = status_watcher(&config);

    let (tx, rx) = channel::<AppEvent>();
    let ctx = Collaborators {
        config: config.clone(),
        current_session,
        bookmarks_path,
        sessions: tmux,
        repos: Arc::new(GhCli::new(config.clone_base_path.clone())),
    };
    let dispatcher = ThreadDispatcher::new(Arc::new(ctx), tx);

    let mut model = AppModel::new(config, bookmarks).with_notice(notice);
    let mut terminal = setup_terminal()?;
    if let Ok((width, height)) = terminal_size() {
        model = model.with_terminal_size(width, height);
    }
    let result = run(&mut terminal, model, &dispatcher, &rx, watcher.as_ref());
    restore_terminal(&mut terminal)?;
    result
}

fn status_watcher(config: &Config) -> Option<StatusDirWatcher> {
    if !config.claude_status_enabled {
        return None;
    }
    match watch_status_dir(&config.cache_dir) {
        Ok(watcher) => Some(watcher),
        Err(error) => {
            warn!(%error, "status updates disabled");
            None
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, app::AppError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let _ = stdout.execute(PushKeyboardEnhancementFlags(
        KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES,
    ));
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<(), app::AppError> {
    disable_raw_mode()?;
    let _ = execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags);
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    model: AppModel,
    dispatcher: &ThreadDispatcher,
    rx: &Receiver<AppEvent>,
    watcher: Option<&StatusDirWatcher>,
) -> Result<(), MainError> {
    let (mut model, command) = app::start(model);
    if apply(command, dispatcher) {
        return Ok(());
    }

    loop {
        while let Ok(event) = rx.try_recv() {
            let (next, command) = app::update(model, event);
            model = next;
            if apply(command, dispatcher) {
                return Ok(());
            }
        }

        if status_files_changed(watcher) {
            let (next, command) = app::update(model, AppEvent::StatusFilesChanged);
            model = next;
            if apply(command, dispatcher) {
                return Ok(());
            }
        }

        terminal
            .draw(|frame| ui::render(frame, &model))
            .map_err(app::AppError::from)?;

        if !event::poll(POLL_INTERVAL).map_err(app::AppError::from)? {
            continue;
        }
        let event = match event::read().map_err(app::AppError::from)? {
            Event::Key(key) if key.kind == KeyEventKind::Release => continue,
            Event::Key(key) => AppEvent::Key(key),
            Event::Resize(width, height) => AppEvent::Resize { width, height },
            _ => continue,
        };
        let (next, command) = app::update(model, event);
        model = next;
        if apply(command, dispatcher) {
            return Ok(());
        }
    }
}

/// Drains pending watcher signals; true when any status file changed.
fn status_files_changed(watcher: Option<&StatusDirWatcher>) -> bool {
    let Some(watcher) = watcher else {
        return false;
    };
    let mut changed = false;
    while let Some(signal) = watcher.try_recv() {
        match signal {
            WatchSignal::Changed => changed = true,
            WatchSignal::Error(error) => warn!(%error, "status watch error"),
        }
    }
    changed
}

/// Hands tasks to the dispatcher; true when the program should exit.
fn apply(command: AppCommand, dispatcher: &ThreadDispatcher) -> bool {
    match command {
        AppCommand::None => false,
        AppCommand::Quit => true,
        AppCommand::Dispatch(task) => {
            dispatcher.dispatch(task);
            false
        }
        AppCommand::Batch(tasks) => {
            for task in tasks {
                dispatcher.dispatch(task);
            }
            false
        }
    }
}
