use std::collections::BTreeSet;

/// Capabilities an element needs to live in a [`ListState`].
pub trait ListItem {
    fn title(&self) -> String;

    fn ordinal_key(&self) -> Option<char> {
        None
    }

    fn filter_fields(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// Digit that quick-selects the item at `index`; only the first nine have one.
pub fn ordinal_for(index: usize) -> Option<char> {
    u32::try_from(index + 1)
        .ok()
        .filter(|n| *n <= 9)
        .and_then(|n| char::from_digit(n, 10))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PageDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Edge {
    Start,
    End,
}

/// Cursor, viewport and selection over an ordered item sequence.
///
/// `cursor` is `None` only for an empty list. For a non-empty list the cursor
/// always lies inside `[offset, offset + height)` and the offset never scrolls
/// past the last full page.
#[derive(Debug, Clone)]
pub struct ListState<T> {
    items: Vec<T>,
    cursor: Option<usize>,
    offset: usize,
    height: usize,
    multi_select: bool,
    selected: BTreeSet<usize>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self::new(Vec::new(), 1)
    }
}

impl<T> ListState<T> {
    pub fn new(items: Vec<T>, height: usize) -> Self {
        let cursor = if items.is_empty() { None } else { Some(0) };
        Self {
            items,
            cursor,
            offset: 0,
            height: height.max(1),
            multi_select: false,
            selected: BTreeSet::new(),
        }
    }

    pub fn with_multi_select(mut self, enabled: bool) -> Self {
        self.multi_select = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn multi_select(&self) -> bool {
        self.multi_select
    }

    pub fn selected(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    pub fn current(&self) -> Option<&T> {
        self.cursor.and_then(|index| self.items.get(index))
    }

    /// Items inside the viewport, paired with their absolute index.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(self.height)
    }

    /// Selected items in list order, or the item under the cursor when
    /// nothing is selected.
    pub fn marked(&self) -> Vec<&T> {
        if self.selected.is_empty() {
            return self.current().into_iter().collect();
        }

        self.selected
            .iter()
            .filter_map(|index| self.items.get(*index))
            .collect()
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.height = height.max(1);
        self.scroll_to_cursor();
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let Some(cursor) = self.cursor else {
            return;
        };

        let last = self.items.len().saturating_sub(1) as isize;
        let next = (cursor as isize).saturating_add(delta).clamp(0, last) as usize;
        self.cursor = Some(next);
        self.scroll_to_cursor();
    }

    pub fn page_move(&mut self, direction: PageDirection) {
        let Some(cursor) = self.cursor else {
            return;
        };

        let last = self.items.len().saturating_sub(1);
        match direction {
            PageDirection::Down => {
                let next = cursor.saturating_add(self.height).min(last);
                self.cursor = Some(next);
                self.offset = next.min(self.max_offset());
            }
            PageDirection::Up => {
                self.cursor = Some(cursor.saturating_sub(self.height));
                self.scroll_to_cursor();
            }
        }
    }

    pub fn jump_to_edge(&mut self, edge: Edge) {
        if self.items.is_empty() {
            return;
        }

        self.cursor = Some(match edge {
            Edge::Start => 0,
            Edge::End => self.items.len() - 1,
        });
        self.scroll_to_cursor();
    }

    /// Flips membership of the cursor row. Returns whether anything changed.
    pub fn toggle_select(&mut self) -> bool {
        if !self.multi_select {
            return false;
        }
        let Some(cursor) = self.cursor else {
            return false;
        };

        if !self.selected.remove(&cursor) {
            self.selected.insert(cursor);
        }
        true
    }

    /// Moves the cursor to the `n`th item (1-based) and returns its index for
    /// the caller to confirm.
    pub fn select_by_ordinal(&mut self, n: usize) -> Option<usize> {
        if n == 0 || n > self.items.len() {
            return None;
        }

        let index = n - 1;
        self.cursor = Some(index);
        self.scroll_to_cursor();
        Some(index)
    }

    fn max_offset(&self) -> usize {
        self.items.len().saturating_sub(self.height)
    }

    fn scroll_to_cursor(&mut self) {
        let Some(cursor) = self.cursor else {
            self.offset = 0;
            return;
        };

        if cursor < self.offset {
            self.offset = cursor;
        } else if cursor >= self.offset + self.height {
            self.offset = cursor + 1 - self.height;
        }
        self.offset = self.offset.min(self.max_offset());
    }
}
