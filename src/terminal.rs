//! Terminal Executor
//!
//! Ties together the parser and the screen model, applying parsed actions to
//! update terminal state. Reports the terminal owes the host (status and
//! cursor position replies) are collected in a [`ReplyQueue`] and only
//! released once a short coalescing delay has passed.

use std::time::{Duration, Instant};

use crate::core::{Screen, DEFAULT_BG, DEFAULT_FG, DEFAULT_SCROLLBACK};
use crate::parser::{Action, CsiAction, EscAction, Parser};

/// How long replies are held back so bursts go out as one write
pub const REPLY_DELAY: Duration = Duration::from_millis(10);

/// Batched reply bytes destined back to the PTY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyQueue {
    pending: Vec<u8>,
    first_queued: Option<Instant>,
    delay: Duration,
}

impl Default for ReplyQueue {
    fn default() -> Self {
        Self::new(REPLY_DELAY)
    }
}

impl ReplyQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: Vec::new(),
            first_queued: None,
            delay,
        }
    }

    pub fn push(&mut self, bytes: &[u8], now: Instant) {
        if self.first_queued.is_none() {
            self.first_queued = Some(now);
        }
        self.pending.extend_from_slice(bytes);
    }

    /// When the queued replies become available, if any are queued
    pub fn deadline(&self) -> Option<Instant> {
        self.first_queued.map(|t| t + self.delay)
    }

    /// Drain everything queued once the delay has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<Vec<u8>> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.first_queued = None;
        Some(std::mem::take(&mut self.pending))
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Terminal executor that processes parsed actions and updates the screen
#[derive(Debug, Clone)]
pub struct Terminal {
    screen: Screen,
    parser: Parser,
    replies: ReplyQueue,
}

impl Terminal {
    /// Create a new terminal with the default scrollback
    pub fn new(cols: usize, rows: usize) -> Self {
        Self::with_scrollback(cols, rows, DEFAULT_SCROLLBACK)
    }

    pub fn with_scrollback(cols: usize, rows: usize, scrollback_capacity: usize) -> Self {
        Self {
            screen: Screen::new(cols, rows, scrollback_capacity),
            parser: Parser::new(),
            replies: ReplyQueue::default(),
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// Whether arrow/Home/End keys should use `ESC O` sequences
    pub fn application_keypad(&self) -> bool {
        self.screen.modes().application_keypad
    }

    /// Process output bytes from the PTY
    pub fn process(&mut self, data: &[u8]) {
        self.process_at(data, Instant::now());
    }

    /// Process output bytes, stamping any replies with `now`
    pub fn process_at(&mut self, data: &[u8], now: Instant) {
        let mut actions = Vec::new();
        for &byte in data {
            self.parser.advance(byte, &mut actions);
            for action in actions.drain(..) {
                self.apply_action(action, now);
            }
        }
    }

    /// Process a string of output
    pub fn write(&mut self, s: &str) {
        self.process(s.as_bytes());
    }

    /// Take batched replies whose coalescing delay has elapsed
    pub fn poll_replies(&mut self, now: Instant) -> Option<Vec<u8>> {
        self.replies.poll(now)
    }

    pub fn reply_deadline(&self) -> Option<Instant> {
        self.replies.deadline()
    }

    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.screen.resize(cols, rows);
    }

    fn apply_action(&mut self, action: Action, now: Instant) {
        match action {
            Action::Print(c) => self.screen.print(c),
            Action::Execute(byte) => self.execute_c0(byte),
            Action::Csi(csi) => self.execute_csi(&csi, now),
            Action::Esc(esc) => self.execute_esc(esc),
        }
    }

    fn execute_c0(&mut self, byte: u8) {
        match byte {
            0x07 => self.screen.bell(),
            0x08 => self.screen.backspace(),
            0x09 => self.screen.tab(),
            // LF, VT, FF
            0x0A | 0x0B | 0x0C => self.screen.linefeed(),
            0x0D => self.screen.carriage_return(),
            0x0E => self.screen.charsets_mut().shift_out(),
            0x0F => self.screen.charsets_mut().shift_in(),
            _ => {}
        }
    }

    fn execute_csi(&mut self, csi: &CsiAction, now: Instant) {
        match csi.prefix {
            None => {}
            Some('?') => return self.execute_csi_private(csi, now),
            Some('>') if csi.final_char == 'c' => {
                return self.replies.push(b"\x1b[>0;276;0c", now);
            }
            Some(_) => return log_unhandled(csi),
        }
        if csi.postfix.is_some() {
            return log_unhandled(csi);
        }

        let n = csi.param_or_default(0, 1) as usize;
        match csi.final_char {
            'A' => self.screen.move_cursor_up(n),
            'B' => self.screen.move_cursor_down(n),
            'C' => self.screen.move_cursor_forward(n),
            'D' => self.screen.move_cursor_backward(n),
            'E' => {
                self.screen.move_cursor_down(n);
                self.screen.carriage_return();
            }
            'F' => {
                self.screen.move_cursor_up(n);
                self.screen.carriage_return();
            }
            'G' | '`' => self.screen.move_cursor_to_col(n - 1),
            'd' => self.screen.move_cursor_to_row(n - 1),
            'H' | 'f' => {
                let row = csi.param_or_default(0, 1) as usize - 1;
                let col = csi.param_or_default(1, 1) as usize - 1;
                self.screen.move_cursor_to(row, col);
            }
            'J' => self.screen.erase_in_display(csi.param(0, 0)),
            'K' => self.screen.erase_in_line(csi.param(0, 0)),
            'X' => self.screen.erase_chars(n),
            'L' => self.screen.insert_lines(n),
            'M' => self.screen.delete_lines(n),
            '@' => self.screen.insert_chars(n),
            'P' => self.screen.delete_chars(n),
            'S' => self.screen.scroll_up(n),
            'T' => self.screen.scroll_down(n),
            'r' => {
                let top = usize::from(csi.param_or_default(0, 1)) - 1;
                let bottom = match csi.param_or_default(1, 0) {
                    0 => self.screen.rows(),
                    n => usize::from(n),
                };
                self.screen.set_scroll_region(top, bottom.saturating_sub(1));
            }
            'm' => self.execute_sgr(csi),
            's' => self.screen.save_cursor(),
            'u' => self.screen.restore_cursor(),
            'n' => self.device_status(csi, now),
            'c' => {
                if csi.param(0, 0) == 0 {
                    self.replies.push(b"\x1b[?1;2c", now);
                }
            }
            // Includes the ANSI modes (insert, newline), which are not supported
            _ => log_unhandled(csi),
        }
    }

    fn execute_csi_private(&mut self, csi: &CsiAction, now: Instant) {
        match csi.final_char {
            'h' | 'l' => {
                let enable = csi.final_char == 'h';
                for &mode in &csi.params {
                    self.set_dec_mode(mode, enable);
                }
            }
            'n' => self.device_status(csi, now),
            // DECSTBM with a private marker is ignored
            _ => log_unhandled(csi),
        }
    }

    fn set_dec_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            1 => self.screen.modes_mut().application_keypad = enable,
            6 => {
                self.screen.modes_mut().origin = enable;
                self.screen.move_cursor_to(0, 0);
            }
            7 => self.screen.modes_mut().wraparound = enable,
            9 | 1000 | 1001 | 1002 | 1003 => self.screen.modes_mut().mouse_tracking = enable,
            25 => self.screen.set_cursor_visible(enable),
            47 | 1047 | 1049 => {
                if enable {
                    self.screen.enter_alternate_screen();
                } else {
                    self.screen.exit_alternate_screen();
                }
            }
            _ => tracing::debug!(mode, enable, "unknown DEC private mode"),
        }
    }

    fn device_status(&mut self, csi: &CsiAction, now: Instant) {
        let cursor = self.screen.cursor();
        let (x, y) = (cursor.x + 1, cursor.y + 1);
        match (csi.prefix, csi.param(0, 0)) {
            (None, 5) => self.replies.push(b"\x1b[0n", now),
            (None, 6) => self.replies.push(format!("\x1b[{};{}R", y, x).as_bytes(), now),
            (Some('?'), 6) => self.replies.push(format!("\x1b[?{};{}R", y, x).as_bytes(), now),
            _ => log_unhandled(csi),
        }
    }

    /// SGR; parameters apply in order
    fn execute_sgr(&mut self, csi: &CsiAction) {
        if csi.params.is_empty() {
            self.screen.attr_mut().reset();
            return;
        }

        let attr = self.screen.attr_mut();
        let mut params = csi.params.iter().copied();
        while let Some(p) = params.next() {
            match p {
                0 => attr.reset(),
                1 => attr.bold = true,
                4 => attr.underline = true,
                22 => attr.bold = false,
                24 => attr.underline = false,
                30..=37 => attr.fg = (p - 30) as u8,
                39 => attr.fg = DEFAULT_FG,
                40..=47 => attr.bg = (p - 40) as u8,
                49 => attr.bg = DEFAULT_BG,
                90..=97 => attr.fg = (p - 90 + 8) as u8,
                100..=107 => attr.bg = (p - 100 + 8) as u8,
                38 | 48 => {
                    // Only the 16-colour subset of `;5;n` is representable
                    if params.next() == Some(5) {
                        match params.next() {
                            Some(n) if n < 16 => {
                                if p == 38 {
                                    attr.fg = n as u8;
                                } else {
                                    attr.bg = n as u8;
                                }
                            }
                            other => tracing::debug!(?other, "unsupported extended colour"),
                        }
                    }
                }
                _ => tracing::debug!(param = p, "unhandled SGR parameter"),
            }
        }
    }

    fn execute_esc(&mut self, esc: EscAction) {
        match esc {
            EscAction::SaveCursor => self.screen.save_cursor(),
            EscAction::RestoreCursor => self.screen.restore_cursor(),
            EscAction::Index => self.screen.linefeed(),
            EscAction::ReverseIndex => self.screen.reverse_index(),
            EscAction::NextLine => {
                self.screen.carriage_return();
                self.screen.linefeed();
            }
            EscAction::FullReset => {
                self.screen.reset();
                self.parser.reset();
            }
            EscAction::ApplicationKeypad => self.screen.modes_mut().application_keypad = true,
            EscAction::NormalKeypad => self.screen.modes_mut().application_keypad = false,
            EscAction::Designate { slot, charset } => self.screen.designate_charset(slot, charset),
            EscAction::Unknown(c) => tracing::debug!(final_char = %c, "unknown ESC sequence"),
        }
    }
}

fn log_unhandled(csi: &CsiAction) {
    tracing::debug!(
        params = ?csi.params,
        prefix = ?csi.prefix,
        postfix = ?csi.postfix,
        final_char = %csi.final_char,
        "unhandled CSI sequence"
    );
}
