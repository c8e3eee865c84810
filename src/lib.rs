//! webtty: a terminal in the browser
//!
//! The crate has two halves. The client-side engine turns the byte stream of
//! a PTY into a screen model and keyboard events into bytes:
//!
//! - `core`: Screen model, cells, cursor, scrollback buffer
//! - `parser`: VT/xterm escape sequence parser
//! - `terminal`: Applies parsed actions to the screen and queues replies
//! - `input`: Key encoding
//!
//! The server half owns the PTYs and multiplexes them over client connections:
//!
//! - `pty`: PTY management and sessions
//! - `server`: Connection multiplexer, resume registry, wire protocol, listener
//! - `app`: Configuration and logging

pub mod app;
pub mod core;
pub mod input;
pub mod parser;
pub mod pty;
pub mod server;
pub mod terminal;

pub use terminal::Terminal;
