use super::PopupSize;
use std::path::Path;

/// Shell command for `run-shell -b`: waits for the picker popup to close,
/// runs lazygit in `dir` inside a popup, then reopens the picker at its
/// previous size (tmux's default size when that is unknown).
pub fn lazygit_popup_command(
    popup: &PopupSize,
    dir: &Path,
    picker_width: u16,
    picker_height: u16,
) -> String {
    let picker_size = match (picker_width, picker_height) {
        (0, _) | (_, 0) => String::new(),
        (width, height) => format!(" -w{width} -h{height}"),
    };
    format!(
        "sleep 0.1 && tmux display-popup -w{} -h{} -d {} -E lazygit; tmux display-popup{picker_size} -B -E {}",
        popup.width,
        popup.height,
        shell_quote(&dir.to_string_lossy()),
        env!("CARGO_PKG_NAME"),
    )
}

fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_opens_lazygit_then_reopens_picker() {
        let popup = PopupSize {
            width: "80%".to_string(),
            height: "30".to_string(),
        };
        let command = lazygit_popup_command(&popup, Path::new("/src/api"), 120, 40);
        assert_eq!(
            command,
            "sleep 0.1 && tmux display-popup -w80% -h30 -d '/src/api' -E lazygit; \
             tmux display-popup -w120 -h40 -B -E tsm"
        );
    }

    #[test]
    fn quotes_in_directory_stay_inside_one_word() {
        let command =
            lazygit_popup_command(&PopupSize::default(), Path::new("/src/bob's"), 80, 24);
        assert!(command.contains(r"-d '/src/bob'\''s' -E lazygit"));
    }

    #[test]
    fn unknown_picker_size_uses_tmux_default() {
        let command = lazygit_popup_command(&PopupSize::default(), Path::new("/src"), 0, 0);
        assert!(command.ends_with("; tmux display-popup -B -E tsm"));
        assert!(command.contains("display-popup -w90% -h90% -d '/src'"));
    }
}
