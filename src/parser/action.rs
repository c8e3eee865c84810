//! Terminal Actions
//!
//! Semantic operations produced by the parser that should be applied to the screen.

use serde::{Deserialize, Serialize};

use crate::core::Charset;

/// A terminal action produced by the parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Print a character to the screen
    Print(char),

    /// Execute a C0 control character (0x00-0x1F except ESC, CAN, SUB)
    Execute(u8),

    /// Execute a CSI (Control Sequence Introducer) command
    Csi(CsiAction),

    /// Execute an ESC sequence (non-CSI)
    Esc(EscAction),
}

/// A complete CSI sequence: `ESC [ [prefix] params [postfix] final`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsiAction {
    /// The final character that identifies the command
    pub final_char: char,
    /// Parameters (semicolon-separated numbers); an empty field is 0
    pub params: Vec<u16>,
    /// Private marker before the parameters (`?`, `>`, `!`)
    pub prefix: Option<char>,
    /// Intermediate after the parameters (`$`, `"`, space, `'`)
    pub postfix: Option<char>,
}

impl CsiAction {
    pub fn new(final_char: char) -> Self {
        Self {
            final_char,
            params: Vec::new(),
            prefix: None,
            postfix: None,
        }
    }

    /// Get parameter at index, or default value if not present
    pub fn param(&self, index: usize, default: u16) -> u16 {
        self.params.get(index).copied().unwrap_or(default)
    }

    /// Get parameter at index, treating 0 as default
    pub fn param_or_default(&self, index: usize, default: u16) -> u16 {
        match self.params.get(index) {
            Some(&0) | None => default,
            Some(&v) => v,
        }
    }
}

/// ESC sequence actions (non-CSI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscAction {
    /// ESC 7 - Save cursor (DECSC)
    SaveCursor,

    /// ESC 8 - Restore cursor (DECRC)
    RestoreCursor,

    /// ESC D - Index (IND)
    Index,

    /// ESC M - Reverse Index (RI)
    ReverseIndex,

    /// ESC E - Next Line (NEL)
    NextLine,

    /// ESC c - Full Reset (RIS)
    FullReset,

    /// ESC = - Application Keypad Mode (DECKPAM)
    ApplicationKeypad,

    /// ESC > - Normal Keypad Mode (DECKPNM)
    NormalKeypad,

    /// ESC ( ) * + - designate a charset into G0-G3
    Designate { slot: usize, charset: Charset },

    /// Unknown ESC sequence (final byte, or the byte after an intermediate)
    Unknown(char),
}
