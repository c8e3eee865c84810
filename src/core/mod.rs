//! Terminal Core Module
//!
//! Platform-independent terminal state management. This module contains:
//! - Screen model (primary grid plus alternate-screen snapshot)
//! - Cell representation with attributes
//! - Cursor state and positioning
//! - Bounded scrollback history
//! - G0-G3 character set designation
//!
//! The core is deterministic: the same sequence of screen operations always
//! produces the same state.

mod cell;
mod charset;
mod cursor;
mod screen;
mod scrollback;

pub use cell::{Attr, Cell, DEFAULT_BG, DEFAULT_FG};
pub use charset::{Charset, CharsetState};
pub use cursor::Cursor;
pub use screen::{Modes, Screen, DEFAULT_SCROLLBACK};
pub use scrollback::{Line, Scrollback};
