use crate::domain::{Bookmark, session_name_for_path};
use crate::infra::{Config, SessionProvider, TmuxError, apply_layout};
use thiserror::Error;
use tracing::info;

/// Shifted digit row of a US keyboard; `M-!` opens slot 1 and so on.
const BINDING_KEYS: [char; 9] = ['!', '@', '#', '$', '%', '^', '&', '*', '('];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Tui,
    Init,
    Bookmark { slot: usize },
    TmuxBindings,
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing bookmark slot")]
    MissingSlot,

    #[error("invalid bookmark slot: {0} (expected 1-9)")]
    InvalidSlot(String),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("no bookmark in slot {slot}")]
    NoBookmark { slot: usize },

    #[error(transparent)]
    Tmux(#[from] TmuxError),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut iter = args.iter().skip(1);
    let Some(subcommand) = iter.next() else {
        return Ok(CliInvocation::Tui);
    };

    let invocation = match subcommand.as_str() {
        "init" => CliInvocation::Init,
        "tmux-bindings" => CliInvocation::TmuxBindings,
        "bookmark" => {
            let raw = iter.next().ok_or(CliParseError::MissingSlot)?;
            CliInvocation::Bookmark {
                slot: parse_slot(raw)?,
            }
        }
        other if other.starts_with('-') => {
            return Err(CliParseError::UnknownFlag(other.to_string()));
        }
        other => return Err(CliParseError::UnknownSubcommand(other.to_string())),
    };

    match iter.next() {
        Some(extra) if extra.starts_with('-') => Err(CliParseError::UnknownFlag(extra.clone())),
        Some(extra) => Err(CliParseError::UnexpectedArgument(extra.clone())),
        None => Ok(invocation),
    }
}

fn parse_slot(raw: &str) -> Result<usize, CliParseError> {
    raw.parse::<usize>()
        .ok()
        .filter(|slot| (1..=9).contains(slot))
        .ok_or_else(|| CliParseError::InvalidSlot(raw.to_string()))
}

pub fn tmux_bindings() -> String {
    BINDING_KEYS
        .iter()
        .enumerate()
        .map(|(idx, key)| format!("bind -n M-{key} run-shell \"tsm bookmark {}\"\n", idx + 1))
        .collect()
}

/// Switches to the session of bookmark `slot` (1-based), creating it first
/// when it is not running.
pub fn run_bookmark(
    slot: usize,
    config: &Config,
    bookmarks: &[Bookmark],
    sessions: &dyn SessionProvider,
) -> Result<(), CliRunError> {
    let bookmark = slot
        .checked_sub(1)
        .and_then(|idx| bookmarks.get(idx))
        .ok_or(CliRunError::NoBookmark { slot })?;
    let session = session_name_for_path(&bookmark.path, config.project_depth);

    if !sessions.session_exists(&session) {
        sessions.create_session(&session, &bookmark.path)?;
        info!(session = %session, dir = %bookmark.path.display(), "created bookmarked session");
        apply_layout(config, &session, &bookmark.path);
    }
    sessions.switch_to(&session)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Session, Window};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn parse_defaults_to_tui_when_no_args() {
        let parsed = parse_invocation(&args(&["tsm"])).expect("parse");
        assert_eq!(parsed, CliInvocation::Tui);
    }

    #[test]
    fn parse_help_flag_wins() {
        let parsed = parse_invocation(&args(&["tsm", "bookmark", "--help"])).expect("parse");
        assert_eq!(parsed, CliInvocation::PrintHelp);
    }

    #[test]
    fn parse_subcommands() {
        assert_eq!(
            parse_invocation(&args(&["tsm", "init"])).expect("parse"),
            CliInvocation::Init
        );
        assert_eq!(
            parse_invocation(&args(&["tsm", "tmux-bindings"])).expect("parse"),
            CliInvocation::TmuxBindings
        );
        assert_eq!(
            parse_invocation(&args(&["tsm", "bookmark", "3"])).expect("parse"),
            CliInvocation::Bookmark { slot: 3 }
        );
    }

    #[test]
    fn parse_rejects_bad_slots_and_extra_args() {
        assert!(matches!(
            parse_invocation(&args(&["tsm", "bookmark"])),
            Err(CliParseError::MissingSlot)
        ));
        assert!(matches!(
            parse_invocation(&args(&["tsm", "bookmark", "0"])),
            Err(CliParseError::InvalidSlot(_))
        ));
        assert!(matches!(
            parse_invocation(&args(&["tsm", "bookmark", "x"])),
            Err(CliParseError::InvalidSlot(_))
        ));
        assert!(matches!(
            parse_invocation(&args(&["tsm", "init", "now"])),
            Err(CliParseError::UnexpectedArgument(_))
        ));
        assert!(matches!(
            parse_invocation(&args(&["tsm", "attach"])),
            Err(CliParseError::UnknownSubcommand(_))
        ));
        assert!(matches!(
            parse_invocation(&args(&["tsm", "--fast"])),
            Err(CliParseError::UnknownFlag(_))
        ));
    }

    #[test]
    fn bindings_cover_nine_slots() {
        let text = tmux_bindings();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "bind -n M-! run-shell \"tsm bookmark 1\"");
        assert_eq!(lines[8], "bind -n M-( run-shell \"tsm bookmark 9\"");
    }

    #[derive(Default)]
    struct RecordingTmux {
        running: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl SessionProvider for RecordingTmux {
        fn list_sessions(&self, _excluding: &str) -> Result<Vec<Session>, TmuxError> {
            Ok(Vec::new())
        }

        fn list_windows(&self, _session: &str) -> Result<Vec<Window>, TmuxError> {
            Ok(Vec::new())
        }

        fn create_session(&self, name: &str, dir: &Path) -> Result<(), TmuxError> {
            self.calls
                .lock()
                .expect("calls")
                .push(format!("new {name} {}", dir.display()));
            Ok(())
        }

        fn kill_session(&self, _name: &str) -> Result<(), TmuxError> {
            Ok(())
        }

        fn kill_window(&self, _session: &str, _index: u32) -> Result<(), TmuxError> {
            Ok(())
        }

        fn switch_to(&self, target: &str) -> Result<(), TmuxError> {
            self.calls
                .lock()
                .expect("calls")
                .push(format!("switch {target}"));
            Ok(())
        }

        fn session_exists(&self, name: &str) -> bool {
            self.running.iter().any(|s| s == name)
        }

        fn session_path(&self, _name: &str) -> Result<PathBuf, TmuxError> {
            Ok(PathBuf::new())
        }

        fn current_session(&self) -> Result<String, TmuxError> {
            Ok(String::new())
        }

        fn run_in_background(&self, _command: &str) -> Result<(), TmuxError> {
            Ok(())
        }
    }

    fn bookmarks() -> Vec<Bookmark> {
        vec![
            Bookmark {
                path: PathBuf::from("/r/acme/web"),
            },
            Bookmark {
                path: PathBuf::from("/r/acme/api"),
            },
        ]
    }

    #[test]
    fn bookmark_switches_to_running_session() {
        let tmux = RecordingTmux {
            running: vec!["acme-api".to_string()],
            ..RecordingTmux::default()
        };
        run_bookmark(2, &Config::default(), &bookmarks(), &tmux).expect("run");
        assert_eq!(*tmux.calls.lock().expect("calls"), vec!["switch acme-api"]);
    }

    #[test]
    fn bookmark_creates_missing_session() {
        let tmux = RecordingTmux::default();
        run_bookmark(1, &Config::default(), &bookmarks(), &tmux).expect("run");
        assert_eq!(
            *tmux.calls.lock().expect("calls"),
            vec!["new acme-web /r/acme/web", "switch acme-web"]
        );
    }

    #[test]
    fn empty_slot_is_an_error() {
        let tmux = RecordingTmux::default();
        let result = run_bookmark(5, &Config::default(), &bookmarks(), &tmux);
        assert!(matches!(result, Err(CliRunError::NoBookmark { slot: 5 })));
    }
}
