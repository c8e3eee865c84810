//! Screen model implementation
//!
//! The screen represents the visible terminal grid plus state like the scroll
//! region, the current attribute and mode flags. It owns a bounded scrollback
//! and, while a full-screen program runs, a snapshot of the primary screen.
//!
//! All operations keep these invariants:
//! - the grid holds exactly `rows` lines of exactly `cols` cells
//! - `0 <= cursor.x < cols` and `0 <= cursor.y < rows`
//! - `scroll_top <= scroll_bottom <= rows - 1`

use serde::{Deserialize, Serialize};

use super::cell::{Attr, Cell};
use super::charset::{Charset, CharsetState};
use super::cursor::Cursor;
use super::scrollback::{Line, Scrollback};

/// Default scrollback capacity (`totalHeight`)
pub const DEFAULT_SCROLLBACK: usize = 1000;

/// Terminal mode flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modes {
    /// Arrow/Home/End send `ESC O` sequences (DECCKM, DECKPAM)
    pub application_keypad: bool,
    /// Cursor addressing relative to the scroll region (DECOM)
    pub origin: bool,
    /// Wrap to the next line after the last column (DECAWM)
    pub wraparound: bool,
    /// Any of the mouse tracking modes (9, 1000-1003)
    pub mouse_tracking: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            application_keypad: false,
            origin: false,
            wraparound: true,
            mouse_tracking: false,
        }
    }
}

/// Snapshot of the primary screen taken while the alternate screen is active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SavedScreen {
    lines: Vec<Line>,
    cursor: Cursor,
    scroll_top: usize,
    scroll_bottom: usize,
}

/// The main screen structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    cols: usize,
    rows: usize,
    lines: Vec<Line>,
    scrollback: Scrollback,
    cursor: Cursor,
    /// DECSC/DECRC slot, position only
    saved_cursor: (usize, usize),
    attr: Attr,
    scroll_top: usize,
    scroll_bottom: usize,
    modes: Modes,
    charsets: CharsetState,
    alternate: Option<SavedScreen>,
    /// Rows changed since the last `take_dirty`
    dirty: Option<(usize, usize)>,
    /// How many lines the viewport is scrolled back into history
    display_offset: usize,
    bell_count: u64,
}

impl Screen {
    /// Create a new screen. Zero dimensions are raised to 1.
    pub fn new(cols: usize, rows: usize, scrollback_capacity: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            lines: blank_grid(cols, rows),
            scrollback: Scrollback::new(scrollback_capacity),
            cursor: Cursor::new(),
            saved_cursor: (0, 0),
            attr: Attr::default(),
            scroll_top: 0,
            scroll_bottom: rows - 1,
            modes: Modes::default(),
            charsets: CharsetState::new(),
            alternate: None,
            dirty: Some((0, rows - 1)),
            display_offset: 0,
            bell_count: 0,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn attr(&self) -> Attr {
        self.attr
    }

    pub fn attr_mut(&mut self) -> &mut Attr {
        &mut self.attr
    }

    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    pub fn modes_mut(&mut self) -> &mut Modes {
        &mut self.modes
    }

    pub fn charsets_mut(&mut self) -> &mut CharsetState {
        &mut self.charsets
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn scroll_bottom(&self) -> usize {
        self.scroll_bottom
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    pub fn is_alternate(&self) -> bool {
        self.alternate.is_some()
    }

    pub fn bell_count(&self) -> u64 {
        self.bell_count
    }

    pub fn get_cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.lines.get(y).and_then(|line| line.get(x))
    }

    pub fn get_line(&self, y: usize) -> Option<&Line> {
        self.lines.get(y)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Text of every visible row, trailing blanks trimmed
    pub fn text(&self) -> Vec<String> {
        self.lines.iter().map(Line::text).collect()
    }

    fn mark_dirty(&mut self, y: usize) {
        self.mark_dirty_range(y, y);
    }

    fn mark_dirty_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.rows - 1);
        self.dirty = Some(match self.dirty {
            Some((s, e)) => (s.min(start), e.max(end)),
            None => (start, end),
        });
    }

    fn mark_all_dirty(&mut self) {
        self.dirty = Some((0, self.rows - 1));
    }

    /// Take the inclusive range of rows that need repainting
    pub fn take_dirty(&mut self) -> Option<(usize, usize)> {
        self.dirty.take()
    }

    // ------------------------------------------------------------------
    // Character output
    // ------------------------------------------------------------------

    /// Write a printable character at the cursor
    pub fn print(&mut self, c: char) {
        let c = self.charsets.translate(c);

        if self.cursor.pending_wrap && self.modes.wraparound {
            self.cursor.x = 0;
            self.linefeed();
        }
        self.cursor.pending_wrap = false;

        let (x, y) = (self.cursor.x, self.cursor.y);
        self.lines[y].cells[x] = Cell::with_attr(c, self.attr);

        if x + 1 < self.cols {
            self.cursor.x += 1;
        } else if self.modes.wraparound {
            self.cursor.pending_wrap = true;
        }

        self.display_offset = 0;
        self.mark_dirty(y);
    }

    /// Line feed (LF, VT, FF, IND)
    pub fn linefeed(&mut self) {
        self.cursor.pending_wrap = false;
        if self.cursor.y == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.y + 1 < self.rows {
            self.cursor.y += 1;
        }
    }

    /// Reverse index (RI)
    pub fn reverse_index(&mut self) {
        self.cursor.pending_wrap = false;
        if self.cursor.y == self.scroll_top {
            self.scroll_down(1);
        } else if self.cursor.y > 0 {
            self.cursor.y -= 1;
        }
    }

    pub fn carriage_return(&mut self) {
        self.cursor.x = 0;
        self.cursor.pending_wrap = false;
    }

    pub fn backspace(&mut self) {
        self.cursor.move_left(1);
    }

    /// Advance to the next multiple-of-8 column
    pub fn tab(&mut self) {
        let next = (self.cursor.x / 8 + 1) * 8;
        self.cursor.x = next.min(self.cols - 1);
        self.cursor.pending_wrap = false;
    }

    pub fn bell(&mut self) {
        self.bell_count += 1;
    }

    // ------------------------------------------------------------------
    // Scrolling
    // ------------------------------------------------------------------

    /// Scroll the region up: lines leave at the top, blanks enter at the bottom
    pub fn scroll_up(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let n = n.min(bottom - top + 1);
        for _ in 0..n {
            let line = self.lines.remove(top);
            if top == 0 && self.alternate.is_none() {
                self.scrollback.push(line);
            }
            self.lines.insert(bottom, Line::new(self.cols));
        }
        self.mark_dirty_range(top, bottom);
    }

    /// Scroll the region down: blanks enter at the top, lines leave at the bottom
    pub fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let n = n.min(bottom - top + 1);
        for _ in 0..n {
            self.lines.remove(bottom);
            self.lines.insert(top, Line::new(self.cols));
        }
        self.mark_dirty_range(top, bottom);
    }

    /// Set the scroll region (0-indexed, inclusive) and home the cursor
    ///
    /// Invalid regions (top >= bottom or bottom past the screen) are ignored.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        if top >= bottom || bottom >= self.rows {
            tracing::debug!(top, bottom, "ignoring invalid scroll region");
            return;
        }
        self.scroll_top = top;
        self.scroll_bottom = bottom;
        self.move_cursor_to(0, 0);
    }

    // ------------------------------------------------------------------
    // Cursor movement
    // ------------------------------------------------------------------

    /// Move cursor to (row, col), 0-indexed, honouring origin mode
    pub fn move_cursor_to(&mut self, row: usize, col: usize) {
        let row = if self.modes.origin {
            self.scroll_top.saturating_add(row).min(self.scroll_bottom)
        } else {
            row
        };
        self.cursor.move_to(col, row, self.cols, self.rows);
    }

    pub fn move_cursor_up(&mut self, n: usize) {
        self.cursor.move_up(n);
    }

    pub fn move_cursor_down(&mut self, n: usize) {
        self.cursor.move_down(n, self.rows);
    }

    pub fn move_cursor_forward(&mut self, n: usize) {
        self.cursor.move_right(n, self.cols);
    }

    pub fn move_cursor_backward(&mut self, n: usize) {
        self.cursor.move_left(n);
    }

    /// Move to column (0-indexed) on the current row
    pub fn move_cursor_to_col(&mut self, col: usize) {
        let y = self.cursor.y;
        self.cursor.move_to(col, y, self.cols, self.rows);
    }

    /// Move to row (0-indexed) keeping the column
    pub fn move_cursor_to_row(&mut self, row: usize) {
        let x = self.cursor.x;
        self.move_cursor_to(row, x);
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor.visible = visible;
        self.mark_dirty(self.cursor.y);
    }

    /// Save the cursor position (DECSC / CSI s)
    pub fn save_cursor(&mut self) {
        self.saved_cursor = (self.cursor.x, self.cursor.y);
    }

    /// Restore the saved cursor position (DECRC / CSI u)
    pub fn restore_cursor(&mut self) {
        let (x, y) = self.saved_cursor;
        self.cursor.move_to(x, y, self.cols, self.rows);
    }

    // ------------------------------------------------------------------
    // Erasing and editing
    // ------------------------------------------------------------------

    /// Erase in display (ED)
    pub fn erase_in_display(&mut self, mode: u16) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let cols = self.cols;
        match mode {
            0 => {
                self.lines[y].erase(x, cols, Attr::default());
                for line in &mut self.lines[y + 1..] {
                    line.clear();
                }
                self.mark_dirty_range(y, self.rows - 1);
            }
            1 => {
                for line in &mut self.lines[..y] {
                    line.clear();
                }
                self.lines[y].erase(0, x + 1, Attr::default());
                self.mark_dirty_range(0, y);
            }
            2 => {
                for line in &mut self.lines {
                    line.clear();
                }
                self.mark_all_dirty();
            }
            // 3 (erase saved lines) is accepted but has no effect
            _ => {}
        }
    }

    /// Erase in line (EL)
    pub fn erase_in_line(&mut self, mode: u16) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let cols = self.cols;
        let line = &mut self.lines[y];
        match mode {
            0 => line.erase(x, cols, Attr::default()),
            1 => line.erase(0, x + 1, Attr::default()),
            2 => line.clear(),
            _ => return,
        }
        self.mark_dirty(y);
    }

    /// Erase characters (ECH): blank `n` cells forward without shifting
    pub fn erase_chars(&mut self, n: usize) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let attr = self.attr;
        self.lines[y].erase(x, x.saturating_add(n), attr);
        self.mark_dirty(y);
    }

    /// Insert blank characters (ICH)
    pub fn insert_chars(&mut self, n: usize) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let n = n.min(self.cols - x);
        if n == 0 {
            return;
        }
        let blank = Cell::blank_with(self.attr);
        let cells = &mut self.lines[y].cells[x..];
        cells.rotate_right(n);
        cells[..n].fill(blank);
        self.mark_dirty(y);
    }

    /// Delete characters (DCH)
    pub fn delete_chars(&mut self, n: usize) {
        let (x, y) = (self.cursor.x, self.cursor.y);
        let n = n.min(self.cols - x);
        if n == 0 {
            return;
        }
        let blank = Cell::blank_with(self.attr);
        let cells = &mut self.lines[y].cells[x..];
        cells.rotate_left(n);
        let len = cells.len();
        cells[len - n..].fill(blank);
        self.mark_dirty(y);
    }

    /// Insert lines (IL) at the cursor row, within the scroll region
    pub fn insert_lines(&mut self, n: usize) {
        let y = self.cursor.y;
        if y < self.scroll_top || y > self.scroll_bottom {
            return;
        }
        let bottom = self.scroll_bottom;
        let n = n.min(bottom - y + 1);
        for _ in 0..n {
            self.lines.remove(bottom);
            self.lines.insert(y, Line::new(self.cols));
        }
        self.mark_dirty_range(y, bottom);
    }

    /// Delete lines (DL) at the cursor row, within the scroll region
    pub fn delete_lines(&mut self, n: usize) {
        let y = self.cursor.y;
        if y < self.scroll_top || y > self.scroll_bottom {
            return;
        }
        let bottom = self.scroll_bottom;
        let n = n.min(bottom - y + 1);
        for _ in 0..n {
            self.lines.remove(y);
            self.lines.insert(bottom, Line::new(self.cols));
        }
        self.mark_dirty_range(y, bottom);
    }

    // ------------------------------------------------------------------
    // Alternate screen
    // ------------------------------------------------------------------

    /// Switch to the alternate screen, snapshotting the primary one
    pub fn enter_alternate_screen(&mut self) {
        if self.alternate.is_some() {
            return;
        }
        let lines = std::mem::replace(&mut self.lines, blank_grid(self.cols, self.rows));
        self.alternate = Some(SavedScreen {
            lines,
            cursor: self.cursor,
            scroll_top: self.scroll_top,
            scroll_bottom: self.scroll_bottom,
        });
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        self.mark_all_dirty();
    }

    /// Restore the primary screen from its snapshot
    pub fn exit_alternate_screen(&mut self) {
        let Some(saved) = self.alternate.take() else {
            return;
        };
        self.lines = saved.lines;
        self.cursor = saved.cursor;
        self.cursor.clamp(self.cols, self.rows);
        self.scroll_top = saved.scroll_top;
        self.scroll_bottom = saved.scroll_bottom;
        self.mark_all_dirty();
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    pub fn display_offset(&self) -> usize {
        self.display_offset
    }

    /// Scroll the viewport into history (positive) or back toward live output
    pub fn scroll_display(&mut self, delta: isize) {
        let max = self.scrollback.len() as isize;
        let offset = (self.display_offset as isize + delta).clamp(0, max);
        if offset as usize != self.display_offset {
            self.display_offset = offset as usize;
            self.mark_all_dirty();
        }
    }

    /// The line shown at viewport row `y`, taking the display offset into account
    pub fn visible_line(&self, y: usize) -> Option<&Line> {
        if self.display_offset == 0 {
            return self.lines.get(y);
        }
        let history = self.scrollback.len();
        let index = history - self.display_offset + y;
        if index < history {
            self.scrollback.get(index)
        } else {
            self.lines.get(index - history)
        }
    }

    // ------------------------------------------------------------------
    // Resize and reset
    // ------------------------------------------------------------------

    /// Resize in place: pad/truncate rows and columns, clamp the cursor
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        if cols == self.cols && rows == self.rows {
            return;
        }

        resize_grid(&mut self.lines, cols, rows);
        if let Some(saved) = self.alternate.as_mut() {
            resize_grid(&mut saved.lines, cols, rows);
            saved.cursor.clamp(cols, rows);
            saved.scroll_top = 0;
            saved.scroll_bottom = rows - 1;
        }
        self.scrollback.resize_lines(cols);

        self.cols = cols;
        self.rows = rows;
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.cursor.clamp(cols, rows);
        self.display_offset = self.display_offset.min(self.scrollback.len());
        self.mark_all_dirty();
    }

    /// Full reset (RIS)
    pub fn reset(&mut self) {
        self.lines = blank_grid(self.cols, self.rows);
        self.alternate = None;
        self.scrollback.clear();
        self.cursor = Cursor::new();
        self.saved_cursor = (0, 0);
        self.attr = Attr::default();
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        self.modes = Modes::default();
        self.charsets.reset();
        self.display_offset = 0;
        self.mark_all_dirty();
    }

    /// Designate a charset into one of G0-G3
    pub fn designate_charset(&mut self, slot: usize, charset: Charset) {
        self.charsets.designate(slot, charset);
    }
}

fn blank_grid(cols: usize, rows: usize) -> Vec<Line> {
    (0..rows).map(|_| Line::new(cols)).collect()
}

fn resize_grid(grid: &mut Vec<Line>, cols: usize, rows: usize) {
    for line in grid.iter_mut() {
        line.resize(cols);
    }
    grid.resize_with(rows, || Line::new(cols));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn print_str(screen: &mut Screen, s: &str) {
        for c in s.chars() {
            screen.print(c);
        }
    }

    fn fill_rows(screen: &mut Screen) {
        for y in 0..screen.rows() {
            screen.move_cursor_to(y, 0);
            screen.print(char::from_digit(y as u32, 10).unwrap());
        }
    }

    #[test]
    fn test_screen_new() {
        let screen = Screen::new(80, 24, 1000);
        assert_eq!(screen.cols(), 80);
        assert_eq!(screen.rows(), 24);
        assert_eq!(screen.lines().len(), 24);
        assert!(screen.lines().iter().all(|l| l.len() == 80));
        assert_eq!((screen.scroll_top(), screen.scroll_bottom()), (0, 23));
    }

    #[test]
    fn test_print_char() {
        let mut screen = Screen::new(80, 24, 1000);
        print_str(&mut screen, "Hi");
        assert_eq!(screen.get_cell(0, 0).unwrap().ch, 'H');
        assert_eq!(screen.get_cell(1, 0).unwrap().ch, 'i');
        assert_eq!(screen.cursor().x, 2);
    }

    #[test]
    fn test_autowrap() {
        let mut screen = Screen::new(5, 3, 1000);
        print_str(&mut screen, "Hello World");
        assert_eq!(screen.get_line(0).unwrap().text(), "Hello");
        assert_eq!(screen.get_line(1).unwrap().text(), " Worl");
        assert_eq!(screen.get_line(2).unwrap().text(), "d");
    }

    #[test]
    fn test_last_column_sets_pending_wrap() {
        let mut screen = Screen::new(5, 3, 1000);
        print_str(&mut screen, "abcde");
        assert_eq!(screen.cursor().x, 4);
        assert!(screen.cursor().pending_wrap);
        screen.print('f');
        assert_eq!((screen.cursor().x, screen.cursor().y), (1, 1));
    }

    #[test]
    fn test_no_wraparound_overwrites_last_column() {
        let mut screen = Screen::new(5, 3, 1000);
        screen.modes_mut().wraparound = false;
        print_str(&mut screen, "abcdefg");
        assert_eq!(screen.get_line(0).unwrap().text(), "abcdg");
        assert_eq!((screen.cursor().x, screen.cursor().y), (4, 0));
    }

    #[test]
    fn test_linefeed_and_scroll() {
        let mut screen = Screen::new(80, 3, 1000);
        for (i, c) in ['1', '2', '3', '4'].iter().enumerate() {
            if i > 0 {
                screen.linefeed();
                screen.carriage_return();
            }
            screen.print(*c);
        }

        assert_eq!(screen.text(), vec!["2", "3", "4"]);
        assert_eq!(screen.scrollback().len(), 1);
        assert_eq!(screen.scrollback().get(0).unwrap().text(), "1");
    }

    #[test]
    fn test_scroll_region_keeps_outside_rows() {
        let mut screen = Screen::new(10, 5, 1000);
        fill_rows(&mut screen);
        screen.set_scroll_region(1, 3);
        assert_eq!((screen.cursor().x, screen.cursor().y), (0, 0));

        screen.move_cursor_to(3, 0);
        screen.linefeed();

        assert_eq!(screen.text(), vec!["0", "2", "3", "", "4"]);
        assert_eq!(screen.lines().len(), 5);
        // Region not at the top: nothing goes to history
        assert!(screen.scrollback().is_empty());
    }

    #[test]
    fn test_invalid_scroll_region_ignored() {
        let mut screen = Screen::new(10, 5, 1000);
        screen.set_scroll_region(3, 3);
        assert_eq!((screen.scroll_top(), screen.scroll_bottom()), (0, 4));
        screen.set_scroll_region(0, 9);
        assert_eq!((screen.scroll_top(), screen.scroll_bottom()), (0, 4));
    }

    #[test]
    fn test_reverse_index_at_top_scrolls_down() {
        let mut screen = Screen::new(10, 3, 1000);
        fill_rows(&mut screen);
        screen.move_cursor_to(0, 0);
        screen.reverse_index();
        assert_eq!(screen.text(), vec!["", "0", "1"]);
    }

    #[test]
    fn test_erase_in_display() {
        let mut screen = Screen::new(10, 3, 1000);
        for _ in 0..30 {
            screen.print('X');
        }

        screen.move_cursor_to(1, 5);
        screen.erase_in_display(0);
        assert_eq!(screen.text(), vec!["XXXXXXXXXX", "XXXXX", ""]);

        screen.erase_in_display(1);
        assert_eq!(screen.text(), vec!["", "", ""]);
    }

    #[test]
    fn test_erase_in_display_3_is_noop() {
        let mut screen = Screen::new(10, 3, 1000);
        print_str(&mut screen, "abc");
        screen.erase_in_display(3);
        assert_eq!(screen.get_line(0).unwrap().text(), "abc");
    }

    #[test]
    fn test_erase_in_line() {
        let mut screen = Screen::new(10, 1, 1000);
        print_str(&mut screen, "ABCDEFGHIJ");

        screen.move_cursor_to(0, 5);
        screen.erase_in_line(0);
        assert_eq!(screen.get_line(0).unwrap().text(), "ABCDE");

        screen.move_cursor_to(0, 1);
        screen.erase_in_line(1);
        assert_eq!(screen.get_line(0).unwrap().text(), "  CDE");

        screen.erase_in_line(2);
        assert_eq!(screen.get_line(0).unwrap().text(), "");
    }

    #[test]
    fn test_insert_delete_lines() {
        let mut screen = Screen::new(10, 5, 1000);
        fill_rows(&mut screen);

        screen.move_cursor_to(2, 0);
        screen.insert_lines(2);
        assert_eq!(screen.text(), vec!["0", "1", "", "", "2"]);

        screen.delete_lines(2);
        assert_eq!(screen.text(), vec!["0", "1", "2", "", ""]);
    }

    #[test]
    fn test_insert_lines_respects_region() {
        let mut screen = Screen::new(10, 5, 1000);
        fill_rows(&mut screen);
        screen.set_scroll_region(1, 3);
        screen.move_cursor_to(1, 0);
        screen.insert_lines(1);
        assert_eq!(screen.text(), vec!["0", "", "1", "2", "4"]);

        // Outside the region: no effect
        screen.move_cursor_to(4, 0);
        screen.insert_lines(1);
        assert_eq!(screen.text(), vec!["0", "", "1", "2", "4"]);
    }

    #[test]
    fn test_insert_delete_chars() {
        let mut screen = Screen::new(10, 1, 1000);
        print_str(&mut screen, "ABCDEFGHIJ");

        screen.move_cursor_to(0, 3);
        screen.insert_chars(2);
        assert_eq!(screen.get_line(0).unwrap().text(), "ABC  DEFGH");

        screen.delete_chars(2);
        assert_eq!(screen.get_line(0).unwrap().text(), "ABCDEFGH");
    }

    #[test]
    fn test_vacated_cells_take_current_attribute() {
        let mut screen = Screen::new(6, 1, 1000);
        print_str(&mut screen, "abcdef");
        screen.attr_mut().bg = 4;
        screen.move_cursor_to(0, 0);
        screen.delete_chars(2);
        assert_eq!(screen.get_cell(5, 0).unwrap().attr.bg, 4);
        assert_eq!(screen.get_cell(5, 0).unwrap().ch, ' ');
    }

    #[test]
    fn test_erase_chars_does_not_shift() {
        let mut screen = Screen::new(10, 1, 1000);
        print_str(&mut screen, "ABCDEF");
        screen.move_cursor_to(0, 1);
        screen.erase_chars(2);
        assert_eq!(screen.get_line(0).unwrap().text(), "A  DEF");
    }

    #[test]
    fn test_tab_stops_every_eight() {
        let mut screen = Screen::new(20, 2, 1000);
        screen.tab();
        assert_eq!(screen.cursor().x, 8);
        screen.tab();
        assert_eq!(screen.cursor().x, 16);
        screen.tab();
        assert_eq!(screen.cursor().x, 19);
    }

    #[test]
    fn test_alternate_screen() {
        let mut screen = Screen::new(80, 24, 1000);
        screen.print('P');
        screen.move_cursor_to(5, 5);

        screen.enter_alternate_screen();
        assert!(screen.is_alternate());
        assert_eq!(screen.get_cell(0, 0).unwrap().ch, ' ');
        screen.move_cursor_to(0, 0);
        screen.print('A');
        assert_eq!(screen.get_cell(0, 0).unwrap().ch, 'A');

        screen.exit_alternate_screen();
        assert!(!screen.is_alternate());
        assert_eq!(screen.get_cell(0, 0).unwrap().ch, 'P');
        assert_eq!((screen.cursor().x, screen.cursor().y), (5, 5));
    }

    #[test]
    fn test_alternate_screen_does_not_feed_scrollback() {
        let mut screen = Screen::new(10, 2, 1000);
        screen.enter_alternate_screen();
        for _ in 0..5 {
            screen.linefeed();
        }
        assert!(screen.scrollback().is_empty());
    }

    #[test]
    fn test_resize() {
        let mut screen = Screen::new(80, 24, 1000);
        screen.print('X');
        screen.move_cursor_to(23, 79);

        screen.resize(40, 12);

        assert_eq!(screen.cols(), 40);
        assert_eq!(screen.rows(), 12);
        assert_eq!(screen.lines().len(), 12);
        assert!(screen.lines().iter().all(|l| l.len() == 40));
        assert_eq!((screen.cursor().x, screen.cursor().y), (39, 11));
        assert_eq!(screen.get_cell(0, 0).unwrap().ch, 'X');
        assert_eq!(screen.scroll_bottom(), 11);
    }

    #[test]
    fn test_resize_while_alternate_keeps_snapshot_consistent() {
        let mut screen = Screen::new(10, 5, 1000);
        screen.enter_alternate_screen();
        screen.resize(4, 3);
        screen.exit_alternate_screen();
        assert_eq!(screen.lines().len(), 3);
        assert!(screen.lines().iter().all(|l| l.len() == 4));
    }

    #[test]
    fn test_save_restore_cursor() {
        let mut screen = Screen::new(80, 24, 1000);
        screen.move_cursor_to(10, 20);
        screen.save_cursor();
        screen.move_cursor_to(0, 0);
        screen.restore_cursor();
        assert_eq!((screen.cursor().x, screen.cursor().y), (20, 10));
    }

    #[test]
    fn test_origin_mode_addresses_relative_to_region() {
        let mut screen = Screen::new(10, 10, 1000);
        screen.set_scroll_region(2, 5);
        screen.modes_mut().origin = true;
        screen.move_cursor_to(0, 0);
        assert_eq!(screen.cursor().y, 2);
        screen.move_cursor_to(9, 0);
        assert_eq!(screen.cursor().y, 5);
    }

    #[test]
    fn test_display_offset_into_history() {
        let mut screen = Screen::new(10, 2, 1000);
        for c in ['a', 'b', 'c', 'd'] {
            screen.print(c);
            screen.linefeed();
            screen.carriage_return();
        }
        assert_eq!(screen.scrollback().len(), 3);

        screen.scroll_display(1);
        assert_eq!(screen.visible_line(0).unwrap().text(), "c");
        assert_eq!(screen.visible_line(1).unwrap().text(), "d");

        screen.scroll_display(100);
        assert_eq!(screen.display_offset(), 3);
        assert_eq!(screen.visible_line(0).unwrap().text(), "a");

        screen.print('z');
        assert_eq!(screen.display_offset(), 0);
    }

    #[test]
    fn test_dirty_range() {
        let mut screen = Screen::new(10, 5, 1000);
        screen.take_dirty();
        screen.move_cursor_to(3, 0);
        screen.print('a');
        screen.move_cursor_to(1, 0);
        screen.print('b');
        assert_eq!(screen.take_dirty(), Some((1, 3)));
        assert_eq!(screen.take_dirty(), None);
    }

    #[test]
    fn test_reset() {
        let mut screen = Screen::new(10, 3, 1000);
        print_str(&mut screen, "abc");
        screen.attr_mut().bold = true;
        screen.set_scroll_region(0, 1);
        screen.reset();
        assert_eq!(screen.text(), vec!["", "", ""]);
        assert!(screen.attr().is_default());
        assert_eq!(screen.scroll_bottom(), 2);
    }
}
