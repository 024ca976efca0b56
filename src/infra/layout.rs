use super::Config;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{info, warn};

/// `<layout_dir>/<layout>.sh` when a layout is configured and the script
/// exists.
pub fn layout_script(config: &Config) -> Option<PathBuf> {
    if config.layout.is_empty() {
        return None;
    }
    let script = config.layout_dir.join(format!("{}.sh", config.layout));
    script.is_file().then_some(script)
}

/// Runs the layout script for a freshly created session. Failures are
/// logged and otherwise ignored.
pub fn apply_layout(config: &Config, session: &str, dir: &Path) {
    let Some(script) = layout_script(config) else {
        return;
    };
    info!(script = %script.display(), session, "applying layout");
    let status = Command::new(&script)
        .arg(session)
        .arg(dir)
        .env("TMUX_SESSION", session)
        .env("TMUX_WORKING_DIR", dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(script = %script.display(), %status, "layout script failed"),
        Err(error) => warn!(script = %script.display(), %error, "failed to run layout script"),
    }
}
