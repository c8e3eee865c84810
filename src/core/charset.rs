//! Character set handling
//!
//! Supports DEC Special Graphics (line drawing) designated into G0-G3, with
//! SO/SI selecting which slot is active.

use serde::{Deserialize, Serialize};

/// Character set designations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Charset {
    #[default]
    Ascii,
    /// DEC Special Graphics (line drawing characters)
    DecSpecialGraphics,
}

impl Charset {
    /// Parse the final byte of a designation sequence (`ESC ( 0` etc.)
    ///
    /// Anything other than `0` falls back to ASCII.
    pub fn from_designator(c: char) -> Self {
        match c {
            '0' => Charset::DecSpecialGraphics,
            _ => Charset::Ascii,
        }
    }
}

/// Character set state for the G0-G3 slots
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharsetState {
    slots: [Charset; 4],
    /// Slot mapped into GL (0 = G0, 1 = G1)
    active: usize,
}

impl CharsetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Designate a charset into slot 0-3
    pub fn designate(&mut self, slot: usize, charset: Charset) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = charset;
        }
    }

    /// Shift In (SI) - select G0
    pub fn shift_in(&mut self) {
        self.active = 0;
    }

    /// Shift Out (SO) - select G1
    pub fn shift_out(&mut self) {
        self.active = 1;
    }

    pub fn current(&self) -> Charset {
        self.slots[self.active]
    }

    /// Translate a character through the active charset
    pub fn translate(&self, c: char) -> char {
        match self.current() {
            Charset::Ascii => c,
            Charset::DecSpecialGraphics => translate_dec_special_graphics(c),
        }
    }
}

/// Map ASCII 0x60-0x7E to DEC line drawing glyphs
fn translate_dec_special_graphics(c: char) -> char {
    match c {
        '`' => '◆',
        'a' => '▒',
        'b' => '␉',
        'c' => '␌',
        'd' => '␍',
        'e' => '␊',
        'f' => '°',
        'g' => '±',
        'h' => '␤',
        'i' => '␋',
        'j' => '┘',
        'k' => '┐',
        'l' => '┌',
        'm' => '└',
        'n' => '┼',
        'o' => '⎺',
        'p' => '⎻',
        'q' => '─',
        'r' => '⎼',
        's' => '⎽',
        't' => '├',
        'u' => '┤',
        'v' => '┴',
        'w' => '┬',
        'x' => '│',
        'y' => '≤',
        'z' => '≥',
        '{' => 'π',
        '|' => '≠',
        '}' => '£',
        '~' => '·',
        _ => c,
    }
}
