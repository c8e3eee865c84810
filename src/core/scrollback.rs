//! Scrollback buffer implementation
//!
//! The scrollback buffer stores lines that have scrolled off the top of the
//! visible screen. It's a capacity-bounded deque: new lines are pushed at the
//! back and the oldest line is dropped from the front once full.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::cell::{Attr, Cell};

/// A line in the terminal, always exactly `cols` cells wide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub cells: Vec<Cell>,
}

impl Line {
    /// Create a blank line with the given number of columns
    pub fn new(cols: usize) -> Self {
        Self {
            cells: vec![Cell::blank(); cols],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Pad or truncate to a new column count
    pub fn resize(&mut self, cols: usize) {
        self.cells.resize(cols, Cell::blank());
    }

    /// Reset all cells to blank
    pub fn clear(&mut self) {
        self.cells.fill(Cell::blank());
    }

    /// Blank the half-open column range `[start, end)`
    pub fn erase(&mut self, start: usize, end: usize, attr: Attr) {
        let end = end.min(self.cells.len());
        if start < end {
            self.cells[start..end].fill(Cell::blank_with(attr));
        }
    }

    pub fn get(&self, x: usize) -> Option<&Cell> {
        self.cells.get(x)
    }

    pub fn get_mut(&mut self, x: usize) -> Option<&mut Cell> {
        self.cells.get_mut(x)
    }

    /// Extract text content with trailing spaces trimmed
    pub fn text(&self) -> String {
        let s: String = self.cells.iter().map(|c| c.ch).collect();
        s.trim_end().to_string()
    }
}

/// Bounded history of lines scrolled off the primary screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scrollback {
    lines: VecDeque<Line>,
    capacity: usize,
}

impl Scrollback {
    pub fn new(capacity: usize) -> Self {
        Self {
            // Don't pre-allocate the whole history
            lines: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push a line, dropping the oldest when full
    pub fn push(&mut self, line: Line) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Take back the most recent line
    pub fn pop(&mut self) -> Option<Line> {
        self.lines.pop_back()
    }

    /// Get a line where 0 is the oldest
    pub fn get(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Resize every stored line to a new column count
    pub fn resize_lines(&mut self, cols: usize) {
        for line in &mut self.lines {
            line.resize(cols);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter()
    }
}
