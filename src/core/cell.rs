//! Terminal Cell
//!
//! Represents a single cell in the terminal grid: one codepoint plus the
//! rendition attributes it was written with.

use serde::{Deserialize, Serialize};

/// Default foreground palette index (white)
pub const DEFAULT_FG: u8 = 7;
/// Default background palette index (black)
pub const DEFAULT_BG: u8 = 0;

/// Rendition attributes applied to newly written characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attr {
    /// Foreground palette index (0-15)
    pub fg: u8,
    /// Background palette index (0-15)
    pub bg: u8,
    pub bold: bool,
    pub underline: bool,
}

impl Default for Attr {
    fn default() -> Self {
        Self {
            fg: DEFAULT_FG,
            bg: DEFAULT_BG,
            bold: false,
            underline: false,
        }
    }
}

impl Attr {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether this is the default attribute
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// A single cell in the terminal grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// The character in this cell
    pub ch: char,
    /// Attributes the character was written with
    pub attr: Attr,
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank()
    }
}

impl Cell {
    /// Create a cell with a character and the default attribute
    pub fn new(ch: char) -> Self {
        Self {
            ch,
            attr: Attr::default(),
        }
    }

    /// Create a cell with a character and attribute
    pub fn with_attr(ch: char, attr: Attr) -> Self {
        Self { ch, attr }
    }

    /// A space with the default attribute
    pub fn blank() -> Self {
        Self::new(' ')
    }

    /// A space carrying the given attribute (used when shifting cells)
    pub fn blank_with(attr: Attr) -> Self {
        Self { ch: ' ', attr }
    }

    /// Check if this cell is blank (space with default attribute)
    pub fn is_blank(&self) -> bool {
        self.ch == ' ' && self.attr.is_default()
    }

    /// Clear the cell to the default blank
    pub fn clear(&mut self) {
        *self = Self::blank();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_default() {
        let cell = Cell::default();
        assert!(cell.is_blank());
        assert_eq!(cell.ch, ' ');
        assert_eq!(cell.attr.fg, DEFAULT_FG);
        assert_eq!(cell.attr.bg, DEFAULT_BG);
    }

    #[test]
    fn test_cell_new() {
        let cell = Cell::new('A');
        assert_eq!(cell.ch, 'A');
        assert!(!cell.is_blank());
    }

    #[test]
    fn test_cell_clear() {
        let mut attr = Attr::default();
        attr.fg = 1;
        attr.bold = true;
        let mut cell = Cell::with_attr('A', attr);
        cell.clear();
        assert!(cell.is_blank());
        assert!(!cell.attr.bold);
    }

    #[test]
    fn test_blank_with_attr_is_not_default_blank() {
        let attr = Attr {
            bg: 4,
            ..Attr::default()
        };
        let cell = Cell::blank_with(attr);
        assert_eq!(cell.ch, ' ');
        assert!(!cell.is_blank());
    }
}
