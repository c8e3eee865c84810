//! Input Encoding Module
//!
//! Translates browser keyboard events into the byte sequences expected by
//! programs running on the PTY.
//!
//! # Keyboard Encoding
//!
//! The sequence a key produces depends on:
//! - Application keypad mode (`CSI ? 1 h`, `ESC =`): arrows, Home and End
//!   switch from `ESC [` to `ESC O`
//! - Modifier keys (Shift, Ctrl, Alt/Meta)
//!
//! A few combinations are reserved for the page itself (scrolling the local
//! viewport, cycling tabs) and encode to nothing; see [`ui_action`].

/// Keyboard modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    /// Alt on most platforms, Meta on macOS
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn alt() -> Self {
        Self {
            alt: true,
            ..Self::NONE
        }
    }

    /// Check if any modifier is pressed
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt
    }
}

/// Keys the encoder knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A character key; letters are lowercase
    Char(char),

    Backspace,
    Tab,
    Enter,
    Escape,

    Up,
    Down,
    Left,
    Right,

    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,

    /// Function keys F1-F12
    F(u8),
}

impl Key {
    /// Map a browser `keyCode` onto a key
    pub fn from_key_code(code: u32) -> Option<Key> {
        let key = match code {
            8 => Key::Backspace,
            9 => Key::Tab,
            13 => Key::Enter,
            27 => Key::Escape,
            32 => Key::Char(' '),
            33 => Key::PageUp,
            34 => Key::PageDown,
            35 => Key::End,
            36 => Key::Home,
            37 => Key::Left,
            38 => Key::Up,
            39 => Key::Right,
            40 => Key::Down,
            45 => Key::Insert,
            46 => Key::Delete,
            48..=57 | 65..=90 => {
                let c = char::from_u32(code)?;
                Key::Char(c.to_ascii_lowercase())
            }
            112..=123 => Key::F((code - 111) as u8),
            189 => Key::Char('-'),
            192 => Key::Char('`'),
            219 => Key::Char('['),
            220 => Key::Char('\\'),
            221 => Key::Char(']'),
            222 => Key::Char('\''),
            _ => return None,
        };
        Some(key)
    }
}

/// Shortcuts handled by the page rather than sent to the PTY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    /// Move the viewport one line into the scrollback
    ScrollLineUp,
    ScrollLineDown,
    /// Move the viewport by a screen height less one line
    ScrollPageUp,
    ScrollPageDown,
    NextTab,
}

/// The page-level action bound to this key, if any
///
/// Ctrl with the arrows or the page keys scrolls the local viewport.
pub fn ui_action(key: Key, modifiers: Modifiers) -> Option<UiAction> {
    match key {
        Key::Up if modifiers.ctrl => Some(UiAction::ScrollLineUp),
        Key::Down if modifiers.ctrl => Some(UiAction::ScrollLineDown),
        Key::PageUp if modifiers.ctrl => Some(UiAction::ScrollPageUp),
        Key::PageDown if modifiers.ctrl => Some(UiAction::ScrollPageDown),
        Key::Char('`') if modifiers.alt => Some(UiAction::NextTab),
        _ => None,
    }
}

/// Encode a key-down event
///
/// Returns an empty vector for page shortcuts and for plain printable
/// characters, which arrive through the key-press path instead.
pub fn encode_key(key: Key, modifiers: Modifiers, application_keypad: bool) -> Vec<u8> {
    if ui_action(key, modifiers).is_some() {
        return Vec::new();
    }

    match key {
        Key::Backspace => {
            if modifiers.shift {
                vec![0x08]
            } else {
                vec![0x7f]
            }
        }
        Key::Tab => {
            if modifiers.shift {
                b"\x1b[Z".to_vec()
            } else {
                vec![b'\t']
            }
        }
        Key::Enter => vec![b'\r'],
        Key::Escape => vec![0x1b],

        Key::Up => cursor_key(b'A', application_keypad),
        Key::Down => cursor_key(b'B', application_keypad),
        Key::Right => cursor_key(b'C', application_keypad),
        Key::Left => cursor_key(b'D', application_keypad),
        Key::Home => cursor_key(b'H', application_keypad),
        Key::End => cursor_key(b'F', application_keypad),

        Key::Insert => tilde_key(2),
        Key::Delete => tilde_key(3),
        Key::PageUp => tilde_key(5),
        Key::PageDown => tilde_key(6),

        Key::F(n) => function_key(n),

        Key::Char(c) => {
            if modifiers.ctrl {
                ctrl_char(c).map(|b| vec![b]).unwrap_or_default()
            } else if modifiers.alt && c.is_ascii_alphanumeric() {
                vec![0x1b, c.to_ascii_lowercase() as u8]
            } else {
                Vec::new()
            }
        }
    }
}

/// Arrow-like keys: `ESC [ x`, or `ESC O x` in application keypad mode
fn cursor_key(code: u8, application_keypad: bool) -> Vec<u8> {
    let intro = if application_keypad { b'O' } else { b'[' };
    vec![0x1b, intro, code]
}

fn tilde_key(number: u8) -> Vec<u8> {
    format!("\x1b[{}~", number).into_bytes()
}

fn function_key(n: u8) -> Vec<u8> {
    match n {
        1 => b"\x1bOP".to_vec(),
        2 => b"\x1bOQ".to_vec(),
        3 => b"\x1bOR".to_vec(),
        4 => b"\x1bOS".to_vec(),
        5 => tilde_key(15),
        6 => tilde_key(17),
        7 => tilde_key(18),
        8 => tilde_key(19),
        9 => tilde_key(20),
        10 => tilde_key(21),
        11 => tilde_key(23),
        12 => tilde_key(24),
        _ => Vec::new(),
    }
}

/// The control byte produced by Ctrl plus a character key
fn ctrl_char(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a' + 1),
        'A'..='Z' => Some(c as u8 - b'A' + 1),
        ' ' | '2' | '@' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '7' => Some(0x1f),
        '8' => Some(0x7f),
        _ => None,
    }
}

/// Encode a key-press (character) event
///
/// Ctrl and Alt combinations are handled on key-down, so they produce nothing here.
pub fn encode_char(c: char, modifiers: Modifiers) -> Vec<u8> {
    if modifiers.ctrl || modifiers.alt || c == '\0' {
        return Vec::new();
    }
    let mut buf = [0u8; 4];
    c.encode_utf8(&mut buf).as_bytes().to_vec()
}

/// Debounces the key-down / key-press pair a browser fires for one keystroke
///
/// When key-down already produced a sequence, the key-press that follows it
/// must not send the character a second time.
#[derive(Debug, Clone, Default)]
pub struct KeyInput {
    suppress_press: bool,
}

impl KeyInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, key: Key, modifiers: Modifiers, application_keypad: bool) -> Vec<u8> {
        let bytes = encode_key(key, modifiers, application_keypad);
        self.suppress_press = !bytes.is_empty();
        bytes
    }

    pub fn key_press(&mut self, c: char, modifiers: Modifiers) -> Vec<u8> {
        if std::mem::take(&mut self.suppress_press) {
            return Vec::new();
        }
        encode_char(c, modifiers)
    }
}
