//! Cursor state management
//!
//! The cursor tracks position and visibility. Movement helpers clamp to the
//! screen bounds so the cursor can never leave the grid.

use serde::{Deserialize, Serialize};

/// Cursor position and visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Column (0-indexed)
    pub x: usize,
    /// Row (0-indexed)
    pub y: usize,
    /// Whether the cursor is visible (DECTCEM)
    pub visible: bool,
    /// The last column was just written; the next printable wraps first
    pub pending_wrap: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            visible: true,
            pending_wrap: false,
        }
    }
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to an absolute position, clamping to bounds
    pub fn move_to(&mut self, x: usize, y: usize, cols: usize, rows: usize) {
        self.x = x.min(cols.saturating_sub(1));
        self.y = y.min(rows.saturating_sub(1));
        self.pending_wrap = false;
    }

    pub fn move_up(&mut self, n: usize) {
        self.y = self.y.saturating_sub(n);
        self.pending_wrap = false;
    }

    pub fn move_down(&mut self, n: usize, rows: usize) {
        self.y = self.y.saturating_add(n).min(rows.saturating_sub(1));
        self.pending_wrap = false;
    }

    pub fn move_left(&mut self, n: usize) {
        self.x = self.x.saturating_sub(n);
        self.pending_wrap = false;
    }

    pub fn move_right(&mut self, n: usize, cols: usize) {
        self.x = self.x.saturating_add(n).min(cols.saturating_sub(1));
        self.pending_wrap = false;
    }

    /// Clamp into a (possibly new) grid size
    pub fn clamp(&mut self, cols: usize, rows: usize) {
        self.x = self.x.min(cols.saturating_sub(1));
        self.y = self.y.min(rows.saturating_sub(1));
        self.pending_wrap = false;
    }
}
