pub const DEFAULT_HEIGHT: usize = 10;

pub type FilterFn<T> = fn(&T, &str) -> bool;

/// A filterable list with a cursor and a scroll window of `height` rows.
///
/// After every mutation the cursor indexes `filtered` (or is 0 when it is
/// empty) and lies inside `scroll_offset..scroll_offset + height`.
#[derive(Clone, Debug)]
pub struct ScrollList<T> {
    items: Vec<T>,
    filtered: Vec<usize>,
    filter: String,
    cursor: usize,
    scroll_offset: usize,
    height: usize,
    matcher: FilterFn<T>,
}

impl<T> ScrollList<T> {
    pub fn new(matcher: FilterFn<T>) -> Self {
        Self {
            items: Vec::new(),
            filtered: Vec::new(),
            filter: String::new(),
            cursor: 0,
            scroll_offset: 0,
            height: DEFAULT_HEIGHT,
            matcher,
        }
    }

    pub fn with_items(matcher: FilterFn<T>, items: Vec<T>) -> Self {
        let mut list = Self::new(matcher);
        list.set_items(items);
        list
    }

    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.apply_filter();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
        self.apply_filter();
    }

    pub fn push_filter_char(&mut self, ch: char) {
        self.filter.push(ch);
        self.apply_filter();
    }

    /// Returns false when the filter was already empty.
    pub fn pop_filter_char(&mut self) -> bool {
        if self.filter.pop().is_none() {
            return false;
        }
        self.apply_filter();
        true
    }

    /// Returns false when there was no filter to clear.
    pub fn clear_filter(&mut self) -> bool {
        if self.filter.is_empty() {
            return false;
        }
        self.filter.clear();
        self.apply_filter();
        true
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set_height(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        self.height = height;
        self.update_scroll();
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index;
        self.clamp_cursor();
        self.update_scroll();
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let target = self.cursor.saturating_add_signed(delta);
        self.set_cursor(target);
    }

    pub fn page_down(&mut self) {
        self.move_cursor(self.height as isize);
    }

    pub fn page_up(&mut self) {
        self.move_cursor(-(self.height as isize));
    }

    pub fn selected(&self) -> Option<&T> {
        self.filtered
            .get(self.cursor)
            .and_then(|index| self.items.get(*index))
    }

    /// Number of items passing the filter.
    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    /// Number of items regardless of the filter.
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Rows inside the scroll window, with their index into the filtered view.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        let end = (self.scroll_offset + self.height).min(self.filtered.len());
        self.filtered[self.scroll_offset.min(end)..end]
            .iter()
            .enumerate()
            .map(move |(offset, index)| (self.scroll_offset + offset, &self.items[*index]))
    }

    pub fn reset(&mut self) {
        self.filter.clear();
        self.cursor = 0;
        self.scroll_offset = 0;
        self.apply_filter();
    }

    /// Moves the selected item within the full set. Refused while a filter
    /// is active, since the filtered order would not show where it lands.
    pub fn move_item(&mut self, delta: isize) -> bool {
        if !self.filter.is_empty() || self.items.is_empty() {
            return false;
        }
        let from = self.cursor;
        let Some(to) = from.checked_add_signed(delta) else {
            return false;
        };
        if to >= self.items.len() {
            return false;
        }
        self.items.swap(from, to);
        self.apply_filter();
        self.set_cursor(to);
        true
    }

    pub fn remove_selected(&mut self) -> Option<T> {
        let index = *self.filtered.get(self.cursor)?;
        let removed = self.items.remove(index);
        self.apply_filter();
        Some(removed)
    }

    fn apply_filter(&mut self) {
        let matcher = self.matcher;
        let filter = self.filter.as_str();
        self.filtered = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| filter.is_empty() || matcher(item, filter))
            .map(|(index, _)| index)
            .collect();
        self.clamp_cursor();
        self.update_scroll();
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.filtered.len().saturating_sub(1));
    }

    fn update_scroll(&mut self) {
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if self.cursor >= self.scroll_offset + self.height {
            self.scroll_offset = self.cursor + 1 - self.height;
        }
        let max_offset = self.filtered.len().saturating_sub(self.height);
        self.scroll_offset = self.scroll_offset.min(max_offset);
    }
}
