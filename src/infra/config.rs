use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# tsm configuration

# Layout script to run for new sessions: <layout_dir>/<layout>.sh <session> <dir>
# Overridden by TMUX_LAYOUT / TMUX_LAYOUTS_DIR.
layout = ""
layout_dir = "~/.config/tmux/layouts"

# Show agent status badges read from <cache_dir>/<session>.status.
# Overridden by TMUX_SESSION_PICKER_CLAUDE_STATUS=1.
claude_status_enabled = false
cache_dir = "~/.cache/tsm"

# Directory picker: directories exactly project_depth levels below each entry.
project_dirs = ["~/repos"]
project_depth = 2

# Working directory for sessions created by name.
default_session_dir = "~"

# Repositories are cloned to <clone_base_path>/<owner>/<repo>.
clone_base_path = "~/repos"

# Ctrl-g opens lazygit for the selected session in a tmux popup of this size.
[lazygit_popup]
width = "90%"
height = "90%"
"#;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub layout: String,
    pub layout_dir: PathBuf,
    pub claude_status_enabled: bool,
    pub cache_dir: PathBuf,
    pub project_dirs: Vec<PathBuf>,
    pub project_depth: usize,
    pub default_session_dir: PathBuf,
    pub clone_base_path: PathBuf,
    pub lazygit_popup: PopupSize,
}

/// `display-popup` dimensions: cells or a percentage such as `90%`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct PopupSize {
    pub width: String,
    pub height: String,
}

impl Default for PopupSize {
    fn default() -> Self {
        Self {
            width: "90%".to_string(),
            height: "90%".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: String::new(),
            layout_dir: PathBuf::from("~/.config/tmux/layouts"),
            claude_status_enabled: false,
            cache_dir: PathBuf::from("~/.cache/tsm"),
            project_dirs: vec![PathBuf::from("~/repos")],
            project_depth: 2,
            default_session_dir: PathBuf::from("~"),
            clone_base_path: PathBuf::from("~/repos"),
            lazygit_popup: PopupSize::default(),
        }
    }
}

impl Config {
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(layout) = env("TMUX_LAYOUT").filter(|v| !v.is_empty()) {
            self.layout = layout;
        }
        if let Some(dir) = env("TMUX_LAYOUTS_DIR").filter(|v| !v.is_empty()) {
            self.layout_dir = PathBuf::from(dir);
        }
        if env("TMUX_SESSION_PICKER_CLAUDE_STATUS").as_deref() == Some("1") {
            self.claude_status_enabled = true;
        }
    }

    /// Expands `~` in every path and clamps the depth to at least one level.
    pub fn normalized(self, home: Option<&Path>) -> Self {
        Self {
            layout: self.layout,
            layout_dir: expand_tilde(&self.layout_dir, home),
            claude_status_enabled: self.claude_status_enabled,
            cache_dir: expand_tilde(&self.cache_dir, home),
            project_dirs: self
                .project_dirs
                .iter()
                .map(|dir| expand_tilde(dir, home))
                .collect(),
            project_depth: self.project_depth.max(1),
            default_session_dir: expand_tilde(&self.default_session_dir, home),
            clone_base_path: expand_tilde(&self.clone_base_path, home),
            lazygit_popup: self.lazygit_popup,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveConfigPathError {
    #[error("could not resolve home directory")]
    HomeDirNotFound,
}

#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum InitConfigError {
    #[error("config already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("failed to write config: {0}")]
    Write(#[from] io::Error),
}

pub fn expand_tilde(path: &Path, home: Option<&Path>) -> PathBuf {
    match (home, path.strip_prefix("~")) {
        (Some(home), Ok(rest)) if rest.as_os_str().is_empty() => home.to_path_buf(),
        (Some(home), Ok(rest)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// `TSM_CONFIG`, else `$XDG_CONFIG_HOME/tsm/config.toml`, else
/// `~/.config/tsm/config.toml`.
pub fn resolve_config_path(
    env: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, ResolveConfigPathError> {
    let home = dirs::home_dir();
    if let Some(path) = env("TSM_CONFIG").filter(|v| !v.is_empty()) {
        return Ok(expand_tilde(Path::new(&path), home.as_deref()));
    }
    if let Some(dir) = env("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join("tsm").join("config.toml"));
    }
    let home = home.ok_or(ResolveConfigPathError::HomeDirNotFound)?;
    Ok(home.join(".config").join("tsm").join("config.toml"))
}

pub fn bookmarks_path(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) => dir.join("bookmarks.json"),
        None => PathBuf::from("bookmarks.json"),
    }
}

/// A missing file yields the defaults.
pub fn load_config(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, LoadConfigError> {
    let mut config = match fs::read_to_string(path) {
        Ok(raw) => parse_config(&raw).map_err(|source| LoadConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?,
        Err(error) if error.kind() == io::ErrorKind::NotFound => Config::default(),
        Err(source) => {
            return Err(LoadConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    config.apply_env_overrides(env);
    Ok(config.normalized(dirs::home_dir().as_deref()))
}

pub fn parse_config(raw: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(raw)
}

pub fn init_config(path: &Path) -> Result<(), InitConfigError> {
    if path.exists() {
        return Err(InitConfigError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = parse_config("layout = \"dev\"\n").expect("parse");
        assert_eq!(config.layout, "dev");
        assert_eq!(config.project_depth, 2);
        assert_eq!(config.project_dirs, vec![PathBuf::from("~/repos")]);
        assert!(!config.claude_status_enabled);
        assert_eq!(config.lazygit_popup, PopupSize::default());
    }

    #[test]
    fn popup_size_keeps_unset_dimension_default() {
        let config = parse_config("[lazygit_popup]\nwidth = \"120\"\n").expect("parse");
        assert_eq!(config.lazygit_popup.width, "120");
        assert_eq!(config.lazygit_popup.height, "90%");
    }

    #[test]
    fn template_parses_to_defaults() {
        let config = parse_config(DEFAULT_CONFIG_TEMPLATE).expect("parse");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn normalized_expands_tilde_and_clamps_depth() {
        let mut config = Config::default();
        config.project_depth = 0;
        let config = config.normalized(Some(Path::new("/home/me")));
        assert_eq!(config.project_dirs, vec![PathBuf::from("/home/me/repos")]);
        assert_eq!(config.default_session_dir, PathBuf::from("/home/me"));
        assert_eq!(config.cache_dir, PathBuf::from("/home/me/.cache/tsm"));
        assert_eq!(config.project_depth, 1);
    }

    #[test]
    fn tilde_is_left_alone_without_home_or_for_other_users() {
        assert_eq!(
            expand_tilde(Path::new("~/x"), None),
            PathBuf::from("~/x")
        );
        assert_eq!(
            expand_tilde(Path::new("~bob/x"), Some(Path::new("/home/me"))),
            PathBuf::from("~bob/x")
        );
    }

    #[test]
    fn env_overrides_layout_and_status() {
        let mut config = Config::default();
        config.apply_env_overrides(env_from(&[
            ("TMUX_LAYOUT", "split"),
            ("TMUX_LAYOUTS_DIR", "/opt/layouts"),
            ("TMUX_SESSION_PICKER_CLAUDE_STATUS", "1"),
        ]));
        assert_eq!(config.layout, "split");
        assert_eq!(config.layout_dir, PathBuf::from("/opt/layouts"));
        assert!(config.claude_status_enabled);
    }

    #[test]
    fn empty_env_values_do_not_override() {
        let mut config = Config::default();
        config.layout = "dev".to_string();
        config.apply_env_overrides(env_from(&[
            ("TMUX_LAYOUT", ""),
            ("TMUX_SESSION_PICKER_CLAUDE_STATUS", "yes"),
        ]));
        assert_eq!(config.layout, "dev");
        assert!(!config.claude_status_enabled);
    }

    #[test]
    fn config_path_prefers_explicit_then_xdg() {
        let path = resolve_config_path(env_from(&[("TSM_CONFIG", "/etc/tsm.toml")]))
            .expect("path");
        assert_eq!(path, PathBuf::from("/etc/tsm.toml"));

        let path = resolve_config_path(env_from(&[("XDG_CONFIG_HOME", "/xdg")])).expect("path");
        assert_eq!(path, PathBuf::from("/xdg/tsm/config.toml"));
        assert_eq!(
            bookmarks_path(&path),
            PathBuf::from("/xdg/tsm/bookmarks.json")
        );
    }

    #[test]
    fn load_reads_file_and_reports_parse_errors() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        let config = load_config(&path, env_from(&[])).expect("defaults");
        assert_eq!(config.project_depth, 2);

        fs::write(&path, "project_depth = 3\nproject_dirs = [\"/src\"]\n").expect("write");
        let config = load_config(&path, env_from(&[])).expect("load");
        assert_eq!(config.project_depth, 3);
        assert_eq!(config.project_dirs, vec![PathBuf::from("/src")]);

        fs::write(&path, "project_depth = \"deep\"\n").expect("write");
        assert!(matches!(
            load_config(&path, env_from(&[])),
            Err(LoadConfigError::Parse { .. })
        ));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("tsm").join("config.toml");
        init_config(&path).expect("init");
        assert!(path.exists());
        assert!(matches!(
            init_config(&path),
            Err(InitConfigError::AlreadyExists(_))
        ));
    }
}
