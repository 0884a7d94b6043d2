use std::ops::Range;

/// Screen lines taken by chrome outside a pane: title, header, footer and status.
/// `page_height` is the terminal height minus three, and a pane shows `page_height - 1` rows.
pub const CHROME_LINES: u16 = 3;

#[must_use]
pub fn page_height_for(terminal_height: u16) -> usize {
    usize::from(terminal_height.saturating_sub(CHROME_LINES))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Viewport over a list with a highlighted cursor row.
///
/// The cursor is kept inside `[offset, offset + page_height - 2]`; single steps scroll by
/// at most one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListViewport {
    offset: usize,
    row: usize,
    page_height: usize,
}

impl ListViewport {
    #[must_use]
    pub fn new(page_height: usize) -> Self {
        Self {
            offset: 0,
            row: 0,
            page_height,
        }
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn row(&self) -> usize {
        self.row
    }

    #[must_use]
    pub fn page_height(&self) -> usize {
        self.page_height
    }

    #[must_use]
    pub fn visible_rows(&self) -> usize {
        self.page_height.saturating_sub(1).max(1)
    }

    #[must_use]
    pub fn visible_range(&self, len: usize) -> Range<usize> {
        let start = self.offset.min(len);
        start..(start + self.visible_rows()).min(len)
    }

    /// Moves one row. Returns false when already at the edge or the list is empty.
    pub fn step(&mut self, direction: Direction, len: usize) -> bool {
        match direction {
            Direction::Up if self.row > 0 && len > 0 => {
                if self.row == self.offset {
                    self.offset -= 1;
                }
                self.row -= 1;
                true
            }
            Direction::Down if self.row + 1 < len => {
                if self.row == self.last_visible() {
                    self.offset += 1;
                }
                self.row += 1;
                true
            }
            _ => false,
        }
    }

    /// Puts the cursor on `row` (clamped into the list) with the least scrolling that shows it.
    pub fn jump_to(&mut self, row: usize, len: usize) {
        if len == 0 {
            self.reset();
            return;
        }
        let row = row.min(len - 1);
        if row < self.offset {
            self.offset = row;
        } else if row > self.last_visible() {
            self.offset = row + 1 - self.visible_rows();
        }
        self.row = row;
    }

    /// Re-validates the cursor after the list shrank or was rebuilt.
    pub fn clamp(&mut self, len: usize) {
        self.jump_to(self.row, len);
    }

    pub fn reset(&mut self) {
        self.offset = 0;
        self.row = 0;
    }

    /// Adopts new geometry, rebuilding scroll state while keeping the cursor on the same row.
    pub fn resize(&mut self, page_height: usize, len: usize) {
        let row = self.row;
        self.page_height = page_height;
        self.reset();
        self.jump_to(row, len);
    }

    fn last_visible(&self) -> usize {
        self.offset + self.visible_rows() - 1
    }
}

/// Viewport over static text without a cursor; moves a page at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollViewport {
    offset: usize,
    page_height: usize,
}

impl ScrollViewport {
    #[must_use]
    pub fn new(page_height: usize) -> Self {
        Self {
            offset: 0,
            page_height,
        }
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn visible_rows(&self) -> usize {
        self.page_height.saturating_sub(1).max(1)
    }

    pub fn page(&mut self, direction: Direction, content_height: usize) {
        self.offset = match direction {
            Direction::Down => (self.offset + self.page_height).min(self.max_offset(content_height)),
            Direction::Up => self.offset.saturating_sub(self.page_height),
        };
    }

    pub fn jump(&mut self, direction: Direction, content_height: usize) {
        self.offset = match direction {
            Direction::Down => self.max_offset(content_height),
            Direction::Up => 0,
        };
    }

    pub fn resize(&mut self, page_height: usize) {
        self.page_height = page_height;
        self.offset = 0;
    }

    fn max_offset(&self, content_height: usize) -> usize {
        content_height.saturating_sub(self.visible_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_height_leaves_room_for_chrome() {
        assert_eq!(page_height_for(24), 21);
        assert_eq!(page_height_for(2), 0);
        assert_eq!(ListViewport::new(21).visible_rows(), 20);
        assert_eq!(ListViewport::new(0).visible_rows(), 1);
    }

    #[test]
    fn stepping_down_stops_on_last_row() {
        let len = 7;
        let mut viewport = ListViewport::new(5);
        for _ in 0..len - 1 {
            assert!(viewport.step(Direction::Down, len));
        }
        assert_eq!(viewport.row(), len - 1);

        assert!(!viewport.step(Direction::Down, len));
        assert_eq!(viewport.row(), len - 1);
    }

    #[test]
    fn stepping_scrolls_one_line_at_a_time() {
        let mut viewport = ListViewport::new(5);
        let len = 10;
        for expected_row in 1..=3 {
            viewport.step(Direction::Down, len);
            assert_eq!(viewport.row(), expected_row);
            assert_eq!(viewport.offset(), 0);
        }

        viewport.step(Direction::Down, len);
        assert_eq!((viewport.row(), viewport.offset()), (4, 1));
        viewport.step(Direction::Down, len);
        assert_eq!((viewport.row(), viewport.offset()), (5, 2));

        for _ in 0..3 {
            viewport.step(Direction::Up, len);
        }
        assert_eq!((viewport.row(), viewport.offset()), (2, 2));
        viewport.step(Direction::Up, len);
        assert_eq!((viewport.row(), viewport.offset()), (1, 1));
    }

    #[test]
    fn cursor_stays_visible_while_stepping() {
        let len = 30;
        let mut viewport = ListViewport::new(6);
        for direction in [Direction::Down; 25].into_iter().chain([Direction::Up; 25]) {
            viewport.step(direction, len);
            assert!(viewport.visible_range(len).contains(&viewport.row()));
        }
    }

    #[test]
    fn up_at_top_is_noop() {
        let mut viewport = ListViewport::new(5);
        assert!(!viewport.step(Direction::Up, 3));
        assert_eq!((viewport.row(), viewport.offset()), (0, 0));
    }

    #[test]
    fn empty_list_disables_movement() {
        let mut viewport = ListViewport::new(5);
        assert!(!viewport.step(Direction::Down, 0));
        assert!(!viewport.step(Direction::Up, 0));
        viewport.jump_to(3, 0);
        assert_eq!((viewport.row(), viewport.offset()), (0, 0));
        assert_eq!(viewport.visible_range(0), 0..0);
    }

    #[test]
    fn jump_to_top_resets_offset() {
        let len = 50;
        let mut viewport = ListViewport::new(10);
        viewport.jump_to(len - 1, len);
        assert_eq!(viewport.row(), 49);
        assert_eq!(viewport.offset(), 41);

        viewport.jump_to(0, len);
        assert_eq!((viewport.row(), viewport.offset()), (0, 0));
    }

    #[test]
    fn jump_clamps_and_scrolls_minimally() {
        let len = 20;
        let mut viewport = ListViewport::new(5);
        viewport.jump_to(100, len);
        assert_eq!((viewport.row(), viewport.offset()), (19, 16));

        viewport.jump_to(17, len);
        assert_eq!((viewport.row(), viewport.offset()), (17, 16));

        viewport.jump_to(10, len);
        assert_eq!((viewport.row(), viewport.offset()), (10, 10));
    }

    #[test]
    fn clamp_after_shrink_keeps_cursor_in_bounds() {
        let mut viewport = ListViewport::new(5);
        viewport.jump_to(9, 10);
        viewport.clamp(4);
        assert_eq!(viewport.row(), 3);
        assert!(viewport.visible_range(4).contains(&3));
    }

    #[test]
    fn resize_preserves_cursor_row() {
        let len = 40;
        let mut viewport = ListViewport::new(30);
        viewport.jump_to(25, len);
        assert_eq!(viewport.offset(), 0);

        viewport.resize(10, len);
        assert_eq!(viewport.row(), 25);
        assert_eq!(viewport.page_height(), 10);
        assert!(viewport.visible_range(len).contains(&25));

        viewport.resize(10, 12);
        assert_eq!(viewport.row(), 11);
    }

    #[test]
    fn help_pages_are_clamped() {
        let content = 25;
        let mut viewport = ScrollViewport::new(10);
        viewport.page(Direction::Down, content);
        assert_eq!(viewport.offset(), 10);
        viewport.page(Direction::Down, content);
        assert_eq!(viewport.offset(), 16);
        viewport.page(Direction::Up, content);
        assert_eq!(viewport.offset(), 6);
        viewport.page(Direction::Up, content);
        assert_eq!(viewport.offset(), 0);
    }

    #[test]
    fn help_jumps_to_either_end() {
        let mut viewport = ScrollViewport::new(10);
        viewport.jump(Direction::Down, 25);
        assert_eq!(viewport.offset(), 16);
        viewport.jump(Direction::Up, 25);
        assert_eq!(viewport.offset(), 0);
    }

    #[test]
    fn short_help_never_scrolls() {
        let mut viewport = ScrollViewport::new(40);
        viewport.page(Direction::Down, 25);
        assert_eq!(viewport.offset(), 0);
        viewport.jump(Direction::Down, 25);
        assert_eq!(viewport.offset(), 0);
    }
}
