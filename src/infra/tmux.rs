use crate::domain::{Session, Window};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

const POPUP_SESSION_PREFIX: &str = "_popup_";

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("failed to run tmux: {0}")]
    Spawn(#[from] io::Error),

    #[error("tmux {command} failed: {stderr}")]
    Command { command: String, stderr: String },
}

/// The session/window backend the picker drives.
pub trait SessionProvider: Send + Sync {
    /// Sessions other than `excluding`, most recently active first.
    fn list_sessions(&self, excluding: &str) -> Result<Vec<Session>, TmuxError>;
    fn list_windows(&self, session: &str) -> Result<Vec<Window>, TmuxError>;
    fn create_session(&self, name: &str, dir: &Path) -> Result<(), TmuxError>;
    fn kill_session(&self, name: &str) -> Result<(), TmuxError>;
    fn kill_window(&self, session: &str, index: u32) -> Result<(), TmuxError>;
    /// `target` is `session` or `session:index`.
    fn switch_to(&self, target: &str) -> Result<(), TmuxError>;
    fn session_exists(&self, name: &str) -> bool;
    fn session_path(&self, name: &str) -> Result<PathBuf, TmuxError>;
    fn current_session(&self) -> Result<String, TmuxError>;
    /// `run-shell -b`: the shell command outlives this process.
    fn run_in_background(&self, command: &str) -> Result<(), TmuxError>;
}

#[derive(Clone, Debug)]
pub struct TmuxClient {
    program: String,
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self {
            program: "tmux".to_string(),
        }
    }
}

impl TmuxClient {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        debug!(?args, "tmux");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        if !output.status.success() {
            return Err(TmuxError::Command {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SessionProvider for TmuxClient {
    fn list_sessions(&self, excluding: &str) -> Result<Vec<Session>, TmuxError> {
        let out = self.run(&[
            "list-sessions",
            "-F",
            "#{session_activity} #{session_name}",
        ])?;
        Ok(parse_sessions(&out, excluding))
    }

    fn list_windows(&self, session: &str) -> Result<Vec<Window>, TmuxError> {
        let out = self.run(&[
            "list-windows",
            "-t",
            session,
            "-F",
            "#{window_index}:#{window_name}",
        ])?;
        Ok(out.lines().filter_map(parse_window_line).collect())
    }

    fn create_session(&self, name: &str, dir: &Path) -> Result<(), TmuxError> {
        let dir = dir.to_string_lossy();
        self.run(&["new-session", "-d", "-s", name, "-c", &dir])?;
        Ok(())
    }

    fn kill_session(&self, name: &str) -> Result<(), TmuxError> {
        self.run(&["kill-session", "-t", name])?;
        Ok(())
    }

    fn kill_window(&self, session: &str, index: u32) -> Result<(), TmuxError> {
        let target = format!("{session}:{index}");
        self.run(&["kill-window", "-t", &target])?;
        Ok(())
    }

    fn switch_to(&self, target: &str) -> Result<(), TmuxError> {
        if inside_tmux() {
            self.run(&["switch-client", "-t", target])?;
            return Ok(());
        }
        // Outside tmux the client takes over this terminal.
        let status = Command::new(&self.program)
            .args(["attach-session", "-t", target])
            .status()?;
        if !status.success() {
            return Err(TmuxError::Command {
                command: "attach-session".to_string(),
                stderr: format!("exited with {status}"),
            });
        }
        Ok(())
    }

    fn session_exists(&self, name: &str) -> bool {
        self.run(&["has-session", "-t", name]).is_ok()
    }

    fn session_path(&self, name: &str) -> Result<PathBuf, TmuxError> {
        let out = self.run(&["display-message", "-p", "-t", name, "#{session_path}"])?;
        Ok(PathBuf::from(out.trim()))
    }

    fn current_session(&self) -> Result<String, TmuxError> {
        let out = self.run(&["display-message", "-p", "#S"])?;
        Ok(out.trim().to_string())
    }

    fn run_in_background(&self, command: &str) -> Result<(), TmuxError> {
        self.run(&["run-shell", "-b", command])?;
        Ok(())
    }
}

pub fn inside_tmux() -> bool {
    std::env::var_os("TMUX").is_some_and(|value| !value.is_empty())
}

/// Parses `list-sessions` output of `<activity> <name>` lines, dropping the
/// current session and popup sessions, newest first.
pub fn parse_sessions(output: &str, excluding: &str) -> Vec<Session> {
    let mut sessions = output
        .lines()
        .filter_map(parse_session_line)
        .filter(|session| session.name != excluding)
        .filter(|session| !session.name.starts_with(POPUP_SESSION_PREFIX))
        .collect::<Vec<_>>();
    sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    sessions
}

fn parse_session_line(line: &str) -> Option<Session> {
    let (activity, name) = line.trim_end().split_once(' ')?;
    if name.is_empty() {
        return None;
    }
    let activity = activity.parse::<i64>().ok()?;
    let last_activity = OffsetDateTime::from_unix_timestamp(activity).ok()?;
    Some(Session::new(name, last_activity))
}

fn parse_window_line(line: &str) -> Option<Window> {
    let (index, name) = line.trim_end().split_once(':')?;
    Some(Window {
        index: index.parse().ok()?,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_sort_newest_first_and_skip_current_and_popups() {
        let output = "100 old\n300 new one\n200 current\n250 _popup_scratch\ngarbage\n";
        let sessions = parse_sessions(output, "current");
        let names = sessions.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["new one", "old"]);
        assert_eq!(sessions[0].last_activity.unix_timestamp(), 300);
        assert!(!sessions[0].expanded);
        assert!(sessions[0].windows.is_empty());
    }

    #[test]
    fn window_lines_keep_colons_in_names() {
        assert_eq!(
            parse_window_line("3:vim: main.rs"),
            Some(Window {
                index: 3,
                name: "vim: main.rs".to_string()
            })
        );
        assert_eq!(parse_window_line("x:shell"), None);
        assert_eq!(parse_window_line("no separator"), None);
    }
}
