//! Parser State Machine
//!
//! A byte-at-a-time escape sequence parser. All state lives in the parser, so
//! feeding a stream in arbitrary chunks yields the same actions as feeding it
//! whole.
//!
//! States:
//! - Ground: normal text, including incremental UTF-8 decoding
//! - Escape: after ESC, waiting for the next byte
//! - Csi: after `ESC [`, collecting prefix, parameters and postfix
//! - CsiIgnore: a malformed CSI, swallowed up to its final byte
//! - Osc: swallowing an OSC/DCS/APC/PM/SOS string until BEL or ST
//! - Charset: after a designator introducer, waiting for the final byte

use super::action::{Action, CsiAction, EscAction};
use crate::core::Charset;

/// Upper bound for a single numeric parameter
const MAX_PARAM: u32 = u16::MAX as u32;

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi,
    CsiIgnore,
    Osc,
    /// `Some(slot)` designates into G0-G3; `None` swallows one byte
    /// (`ESC #`, `ESC %`, `ESC SP` sequences we don't implement)
    Charset(Option<usize>),
}

/// Incremental UTF-8 decoder for ground-state text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Utf8Decoder {
    buf: [u8; 4],
    len: usize,
    needed: usize,
}

impl Utf8Decoder {
    fn in_progress(&self) -> bool {
        self.needed > 0
    }

    fn start(&mut self, byte: u8, needed: usize) {
        self.buf[0] = byte;
        self.len = 1;
        self.needed = needed;
    }

    /// Feed a continuation byte; returns the char once complete
    fn push(&mut self, byte: u8) -> Option<char> {
        self.buf[self.len] = byte;
        self.len += 1;
        self.needed -= 1;
        if self.needed > 0 {
            return None;
        }
        let decoded = std::str::from_utf8(&self.buf[..self.len])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        self.len = 0;
        Some(decoded)
    }

    fn abort(&mut self) {
        self.len = 0;
        self.needed = 0;
    }
}

/// The terminal parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parser {
    state: State,
    /// Completed CSI parameters
    params: Vec<u16>,
    /// Parameter being built, `None` until a digit is seen
    current: Option<u32>,
    prefix: Option<char>,
    postfix: Option<char>,
    /// An ESC arrived inside a string; `\` completes ST
    string_esc: bool,
    utf8: Utf8Decoder,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a new parser in the ground state
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            params: Vec::with_capacity(16),
            current: None,
            prefix: None,
            postfix: None,
            string_esc: false,
            utf8: Utf8Decoder::default(),
        }
    }

    /// Reset the parser to initial state
    pub fn reset(&mut self) {
        self.state = State::Ground;
        self.clear_params();
        self.string_esc = false;
        self.utf8.abort();
    }

    /// Whether the parser sits in the ground state with no partial character
    pub fn is_ground(&self) -> bool {
        self.state == State::Ground && !self.utf8.in_progress()
    }

    fn clear_params(&mut self) {
        self.params.clear();
        self.current = None;
        self.prefix = None;
        self.postfix = None;
    }

    /// Process a chunk of bytes, returning actions
    pub fn parse(&mut self, data: &[u8]) -> Vec<Action> {
        let mut actions = Vec::new();
        for &byte in data {
            self.advance(byte, &mut actions);
        }
        actions
    }

    /// Process a single byte, appending any resulting actions
    pub fn advance(&mut self, byte: u8, out: &mut Vec<Action>) {
        if self.utf8.in_progress() {
            if (0x80..=0xBF).contains(&byte) {
                if let Some(c) = self.utf8.push(byte) {
                    out.push(Action::Print(c));
                }
                return;
            }
            // Truncated sequence: replace it and handle this byte normally
            self.utf8.abort();
            out.push(Action::Print(char::REPLACEMENT_CHARACTER));
        }

        // CAN and SUB abort any sequence
        if byte == 0x18 || byte == 0x1A {
            self.state = State::Ground;
            self.string_esc = false;
            return;
        }

        match self.state {
            State::Ground => self.ground(byte, out),
            State::Escape => self.escape(byte, out),
            State::Csi => self.csi(byte, out),
            State::CsiIgnore => self.csi_ignore(byte, out),
            State::Osc => self.string(byte, out),
            State::Charset(slot) => self.charset(slot, byte, out),
        }
    }

    fn ground(&mut self, byte: u8, out: &mut Vec<Action>) {
        match byte {
            0x1B => self.enter_escape(),
            0x00..=0x1F => out.push(Action::Execute(byte)),
            0x7F => {}
            0x20..=0x7E => out.push(Action::Print(byte as char)),
            0xC2..=0xDF => self.utf8.start(byte, 1),
            0xE0..=0xEF => self.utf8.start(byte, 2),
            0xF0..=0xF4 => self.utf8.start(byte, 3),
            // Stray continuation or invalid lead byte
            _ => out.push(Action::Print(char::REPLACEMENT_CHARACTER)),
        }
    }

    fn enter_escape(&mut self) {
        self.state = State::Escape;
        self.clear_params();
    }

    fn escape(&mut self, byte: u8, out: &mut Vec<Action>) {
        let action = match byte {
            0x1B => return,
            // C0 controls execute without leaving the sequence
            0x00..=0x1F => {
                out.push(Action::Execute(byte));
                return;
            }
            b'[' => {
                self.state = State::Csi;
                return;
            }
            b']' | b'P' | b'_' | b'^' | b'X' => {
                self.state = State::Osc;
                self.string_esc = false;
                return;
            }
            b'(' | b')' | b'*' | b'+' => {
                self.state = State::Charset(Some((byte - b'(') as usize));
                return;
            }
            b'#' | b'%' | b' ' => {
                self.state = State::Charset(None);
                return;
            }
            b'7' => EscAction::SaveCursor,
            b'8' => EscAction::RestoreCursor,
            b'D' => EscAction::Index,
            b'E' => EscAction::NextLine,
            b'M' => EscAction::ReverseIndex,
            b'c' => EscAction::FullReset,
            b'=' => EscAction::ApplicationKeypad,
            b'>' => EscAction::NormalKeypad,
            _ => EscAction::Unknown(byte as char),
        };
        self.state = State::Ground;
        out.push(Action::Esc(action));
    }

    fn charset(&mut self, slot: Option<usize>, byte: u8, out: &mut Vec<Action>) {
        self.state = State::Ground;
        match slot {
            Some(slot) => out.push(Action::Esc(EscAction::Designate {
                slot,
                charset: Charset::from_designator(byte as char),
            })),
            None => out.push(Action::Esc(EscAction::Unknown(byte as char))),
        }
    }

    fn csi(&mut self, byte: u8, out: &mut Vec<Action>) {
        match byte {
            0x1B => self.enter_escape(),
            0x00..=0x1F => out.push(Action::Execute(byte)),
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u32;
                let value = self.current.unwrap_or(0).saturating_mul(10) + digit;
                self.current = Some(value.min(MAX_PARAM));
            }
            b';' | b':' => {
                self.params.push(self.current.take().unwrap_or(0) as u16);
            }
            b'?' | b'>' | b'!' | b'<' | b'=' => {
                if self.params.is_empty() && self.current.is_none() && self.prefix.is_none() {
                    self.prefix = Some(byte as char);
                }
            }
            b'$' | b'"' | b' ' | b'\'' => {
                self.postfix = Some(byte as char);
            }
            0x40..=0x7E => {
                if let Some(value) = self.current.take() {
                    self.params.push(value as u16);
                }
                let action = CsiAction {
                    final_char: byte as char,
                    params: std::mem::take(&mut self.params),
                    prefix: self.prefix.take(),
                    postfix: self.postfix.take(),
                };
                self.state = State::Ground;
                out.push(Action::Csi(action));
            }
            0x7F => {}
            // Unsupported intermediates and stray bytes void the sequence
            _ => {
                tracing::debug!(byte, "malformed CSI sequence");
                self.state = State::CsiIgnore;
                self.clear_params();
            }
        }
    }

    fn csi_ignore(&mut self, byte: u8, out: &mut Vec<Action>) {
        match byte {
            0x1B => self.enter_escape(),
            0x00..=0x1F => out.push(Action::Execute(byte)),
            0x40..=0x7E => self.state = State::Ground,
            _ => {}
        }
    }

    /// OSC and friends are consumed without interpretation
    fn string(&mut self, byte: u8, out: &mut Vec<Action>) {
        if self.string_esc {
            self.string_esc = false;
            if byte == b'\\' {
                self.state = State::Ground;
            } else {
                // ESC followed by anything else starts a new sequence
                self.enter_escape();
                self.escape(byte, out);
            }
            return;
        }
        match byte {
            0x07 => self.state = State::Ground,
            0x1B => self.string_esc = true,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_csi(actions: &[Action]) -> &CsiAction {
        assert_eq!(actions.len(), 1, "expected one action, got {:?}", actions);
        match &actions[0] {
            Action::Csi(csi) => csi,
            other => panic!("Expected Csi, got {:?}", other),
        }
    }

    #[test]
    fn test_parser_print() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"Hello");

        assert_eq!(actions.len(), 5);
        assert_eq!(actions[0], Action::Print('H'));
        assert_eq!(actions[4], Action::Print('o'));
    }

    #[test]
    fn test_parser_c0_controls() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"A\nB\rC");

        assert_eq!(
            actions,
            vec![
                Action::Print('A'),
                Action::Execute(b'\n'),
                Action::Print('B'),
                Action::Execute(b'\r'),
                Action::Print('C'),
            ]
        );
    }

    #[test]
    fn test_parser_csi_cursor_up() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b[5A");
        let csi = single_csi(&actions);
        assert_eq!(csi.params, vec![5]);
        assert_eq!(csi.final_char, 'A');
        assert_eq!(csi.prefix, None);
    }

    #[test]
    fn test_parser_csi_cup() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b[10;20H");
        let csi = single_csi(&actions);
        assert_eq!(csi.params, vec![10, 20]);
        assert_eq!(csi.final_char, 'H');
    }

    #[test]
    fn test_parser_csi_empty_fields_are_zero() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b[;5H");
        assert_eq!(single_csi(&actions).params, vec![0, 5]);
    }

    #[test]
    fn test_parser_csi_private() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b[?25h");
        let csi = single_csi(&actions);
        assert_eq!(csi.params, vec![25]);
        assert_eq!(csi.final_char, 'h');
        assert_eq!(csi.prefix, Some('?'));
    }

    #[test]
    fn test_parser_csi_postfix() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b[2 q");
        let csi = single_csi(&actions);
        assert_eq!(csi.params, vec![2]);
        assert_eq!(csi.postfix, Some(' '));
        assert_eq!(csi.final_char, 'q');
    }

    #[test]
    fn test_parser_csi_sgr() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b[1;31;48;5;196m");
        assert_eq!(single_csi(&actions).params, vec![1, 31, 48, 5, 196]);
    }

    #[test]
    fn test_parser_param_saturates() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b[99999999A");
        assert_eq!(single_csi(&actions).params, vec![u16::MAX]);
    }

    #[test]
    fn test_parser_c0_inside_csi_executes() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b[1\n2H");
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], Action::Execute(b'\n'));
        assert_eq!(single_csi(&actions[1..]).params, vec![12]);
    }

    #[test]
    fn test_parser_esc_save_restore() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b7\x1b8");
        assert_eq!(
            actions,
            vec![
                Action::Esc(EscAction::SaveCursor),
                Action::Esc(EscAction::RestoreCursor),
            ]
        );
    }

    #[test]
    fn test_parser_osc_swallowed() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b]0;My Title\x07X");
        assert_eq!(actions, vec![Action::Print('X')]);

        let actions = parser.parse(b"\x1b]2;title\x1b\\Y");
        assert_eq!(actions, vec![Action::Print('Y')]);
    }

    #[test]
    fn test_parser_dcs_swallowed() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1bP1$r0m\x1b\\Z");
        assert_eq!(actions, vec![Action::Print('Z')]);
    }

    #[test]
    fn test_parser_esc_in_string_starts_new_sequence() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b]0;abc\x1b[2J");
        assert_eq!(single_csi(&actions).final_char, 'J');
    }

    #[test]
    fn test_parser_utf8() {
        let mut parser = Parser::new();
        let actions = parser.parse("Hello 世界".as_bytes());
        assert_eq!(actions.len(), 8);
        assert_eq!(actions[6], Action::Print('世'));
        assert_eq!(actions[7], Action::Print('界'));
    }

    #[test]
    fn test_parser_chunk_boundary() {
        let mut parser = Parser::new();
        assert!(parser.parse(b"\x1b[").is_empty());
        assert!(parser.parse(b"5").is_empty());
        let actions = parser.parse(b"A");
        assert_eq!(single_csi(&actions).params, vec![5]);
    }

    #[test]
    fn test_parser_utf8_chunk_boundary() {
        let mut parser = Parser::new();
        // '世' is E4 B8 96
        assert!(parser.parse(&[0xE4]).is_empty());
        assert!(parser.parse(&[0xB8]).is_empty());
        assert_eq!(parser.parse(&[0x96]), vec![Action::Print('世')]);
    }

    #[test]
    fn test_parser_truncated_utf8_is_replaced() {
        let mut parser = Parser::new();
        let actions = parser.parse(&[0xE4, b'A']);
        assert_eq!(
            actions,
            vec![Action::Print(char::REPLACEMENT_CHARACTER), Action::Print('A')]
        );
    }

    #[test]
    fn test_parser_cancel_sequence() {
        let mut parser = Parser::new();
        // CAN cancels the sequence, 'A' is printed
        let actions = parser.parse(b"\x1b[5\x18A");
        assert_eq!(actions, vec![Action::Print('A')]);
    }

    #[test]
    fn test_parser_empty_params() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b[H");
        let csi = single_csi(&actions);
        assert!(csi.params.is_empty());
        assert_eq!(csi.final_char, 'H');
    }

    #[test]
    fn test_parser_designate_charset() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1b(B\x1b)0");
        assert_eq!(
            actions,
            vec![
                Action::Esc(EscAction::Designate {
                    slot: 0,
                    charset: Charset::Ascii
                }),
                Action::Esc(EscAction::Designate {
                    slot: 1,
                    charset: Charset::DecSpecialGraphics
                }),
            ]
        );
    }

    #[test]
    fn test_parser_unsupported_csi_intermediate_is_swallowed() {
        let mut parser = Parser::new();
        // DECSCA-like `#` intermediate: nothing of it may print
        let actions = parser.parse(b"\x1b[1#q\x1b[2;#\rpok");
        assert_eq!(
            actions,
            vec![Action::Execute(b'\r'), Action::Print('o'), Action::Print('k')]
        );
        assert!(parser.is_ground());
    }

    #[test]
    fn test_parser_unknown_escape_returns_to_ground() {
        let mut parser = Parser::new();
        let actions = parser.parse(b"\x1bZok");
        assert_eq!(actions[0], Action::Esc(EscAction::Unknown('Z')));
        assert_eq!(&actions[1..], &[Action::Print('o'), Action::Print('k')]);
        assert!(parser.is_ground());
    }
}
