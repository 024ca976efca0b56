use std::cmp::min;

/// Single-line text input with a character limit.
#[derive(Clone, Debug)]
pub struct LineEditor {
    pub text: String,
    pub cursor_col: usize,
    max_chars: usize,
}

impl LineEditor {
    pub fn with_limit(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            cursor_col: 0,
            max_chars,
        }
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_full(&self) -> bool {
        self.char_count() >= self.max_chars
    }

    /// Returns false when the character was rejected.
    pub fn insert_char(&mut self, ch: char) -> bool {
        if ch.is_control() || self.is_full() {
            return false;
        }
        self.clamp_cursor();
        let byte_index = char_to_byte_index(&self.text, self.cursor_col);
        self.text.insert(byte_index, ch);
        self.cursor_col += 1;
        true
    }

    pub fn backspace(&mut self) {
        self.clamp_cursor();
        if self.cursor_col == 0 {
            return;
        }

        let byte_index = char_to_byte_index(&self.text, self.cursor_col - 1);
        self.text.remove(byte_index);
        self.cursor_col -= 1;
    }

    pub fn delete_forward(&mut self) {
        self.clamp_cursor();
        if self.cursor_col >= self.char_count() {
            return;
        }

        let byte_index = char_to_byte_index(&self.text, self.cursor_col);
        self.text.remove(byte_index);
    }

    pub fn move_left(&mut self) {
        self.clamp_cursor();
        self.cursor_col = self.cursor_col.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.clamp_cursor();
        self.cursor_col = (self.cursor_col + 1).min(self.char_count());
    }

    pub fn move_home(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_col = self.char_count();
    }

    fn clamp_cursor(&mut self) {
        self.cursor_col = min(self.cursor_col, self.char_count());
    }
}

fn char_to_byte_index(text: &str, char_index: usize) -> usize {
    match text.char_indices().nth(char_index) {
        Some((idx, _)) => idx,
        None => text.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_backspace_behave_on_unicode() {
        let mut editor = LineEditor::with_limit(50);
        editor.insert_char('a');
        editor.insert_char('λ');
        editor.insert_char('b');
        editor.move_left();
        editor.backspace();
        assert_eq!(editor.text, "ab");
        assert_eq!(editor.cursor_col, 1);
        editor.delete_forward();
        assert_eq!(editor.text, "a");
    }

    #[test]
    fn rejects_input_past_limit() {
        let mut editor = LineEditor::with_limit(3);
        for ch in "abcd".chars() {
            editor.insert_char(ch);
        }
        assert_eq!(editor.text, "abc");
        assert!(editor.is_full());
        assert!(!editor.insert_char('e'));
    }

    #[test]
    fn rejects_control_characters() {
        let mut editor = LineEditor::with_limit(10);
        assert!(!editor.insert_char('\n'));
        assert!(editor.text.is_empty());
    }

    #[test]
    fn home_and_end_move_between_bounds() {
        let mut editor = LineEditor::with_limit(10);
        editor.insert_char('x');
        editor.insert_char('y');
        editor.move_home();
        editor.insert_char('w');
        assert_eq!(editor.text, "wxy");
        editor.move_end();
        assert_eq!(editor.cursor_col, 3);
    }
}
