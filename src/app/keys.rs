use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyAction {
    Up,
    Down,
    PageUp,
    PageDown,
    Expand,
    Collapse,
    Select,
    Kill,
    Confirm,
    Create,
    PickDirectory,
    CloneRepo,
    Bookmarks,
    AddBookmark,
    Lazygit,
    MoveUp,
    MoveDown,
    Cancel,
    Quit,
    Backspace,
    /// Digit 1-9 typed without modifiers.
    Jump(u8),
    Char(char),
}

impl KeyAction {
    /// The character a key contributes to a filter, if any.
    pub fn typed_char(self) -> Option<char> {
        match self {
            Self::Char(ch) => Some(ch),
            Self::Jump(n) => char::from_digit(u32::from(n), 10),
            _ => None,
        }
    }
}

pub fn classify(key: KeyEvent) -> Option<KeyAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    if ctrl {
        let KeyCode::Char(ch) = key.code else {
            return None;
        };
        return match ch.to_ascii_lowercase() {
            'c' => Some(KeyAction::Quit),
            'k' => Some(KeyAction::Up),
            'j' => Some(KeyAction::Down),
            'l' => Some(KeyAction::Expand),
            'h' => Some(KeyAction::Collapse),
            'x' => Some(KeyAction::Kill),
            'y' => Some(KeyAction::Confirm),
            'n' => Some(KeyAction::Create),
            'p' => Some(KeyAction::PickDirectory),
            'r' => Some(KeyAction::CloneRepo),
            'b' => Some(KeyAction::Bookmarks),
            'a' => Some(KeyAction::AddBookmark),
            'g' => Some(KeyAction::Lazygit),
            'u' => Some(KeyAction::MoveUp),
            'd' => Some(KeyAction::MoveDown),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Up if shift => Some(KeyAction::MoveUp),
        KeyCode::Down if shift => Some(KeyAction::MoveDown),
        KeyCode::Up => Some(KeyAction::Up),
        KeyCode::Down => Some(KeyAction::Down),
        KeyCode::PageUp => Some(KeyAction::PageUp),
        KeyCode::PageDown => Some(KeyAction::PageDown),
        KeyCode::Right => Some(KeyAction::Expand),
        KeyCode::Left => Some(KeyAction::Collapse),
        KeyCode::Enter => Some(KeyAction::Select),
        KeyCode::Esc => Some(KeyAction::Cancel),
        KeyCode::Backspace => Some(KeyAction::Backspace),
        KeyCode::Char(_) if alt => None,
        KeyCode::Char(ch @ '1'..='9') => ch
            .to_digit(10)
            .and_then(|n| u8::try_from(n).ok())
            .map(KeyAction::Jump),
        KeyCode::Char(ch) if !ch.is_control() => Some(KeyAction::Char(ch)),
        _ => None,
    }
}
