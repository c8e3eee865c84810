//! PTY (Pseudoterminal) handling
//!
//! This module provides functionality for creating and managing pseudoterminals,
//! spawning child processes, and streaming their output.
//!
//! Forking goes through the [`PtyProvider`] trait so the session layer can run
//! against the real POSIX implementation or an in-memory stand-in.

mod session;
#[cfg(unix)]
mod unix;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use session::{sanitize_process_name, PtySession};
#[cfg(unix)]
pub use unix::{get_window_size, Pty, UnixPtyProvider};

/// Error type for PTY operations
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("Failed to open PTY master: {0}")]
    OpenMaster(#[source] nix::Error),

    #[error("Failed to grant PTY access: {0}")]
    GrantPty(#[source] nix::Error),

    #[error("Failed to unlock PTY: {0}")]
    UnlockPty(#[source] nix::Error),

    #[error("Failed to get PTY slave name: {0}")]
    PtsName(#[source] nix::Error),

    #[error("Failed to fork: {0}")]
    Fork(#[source] nix::Error),

    #[error("Invalid spawn argument: {0:?}")]
    InvalidArgument(String),

    #[error("Failed to set window size: {0}")]
    SetWinsize(#[source] nix::Error),

    #[error("Failed to read from PTY: {0}")]
    Read(#[source] nix::Error),

    #[error("Failed to write to PTY: {0}")]
    Write(#[source] nix::Error),

    #[error("Failed to set non-blocking mode: {0}")]
    SetNonBlocking(#[source] nix::Error),

    #[error("PTY is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for PTY operations
pub type PtyResult<T> = Result<T, PtyError>;

/// Window size for PTY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
    pub pixel_width: u16,
    pub pixel_height: u16,
}

impl WindowSize {
    /// Create a new window size with just rows and columns
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

/// Everything needed to start a child on a fresh PTY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOptions {
    pub shell: String,
    pub args: Vec<String>,
    pub size: WindowSize,
    pub cwd: Option<String>,
    /// Extra environment on top of the server's own
    pub env: BTreeMap<String, String>,
    /// Value for `TERM`
    pub term_name: String,
}

impl SpawnOptions {
    pub fn new(shell: impl Into<String>, size: WindowSize) -> Self {
        Self {
            shell: shell.into(),
            args: Vec::new(),
            size,
            cwd: None,
            env: BTreeMap::new(),
            term_name: "xterm".to_string(),
        }
    }
}

/// Receives output and exit notifications from a running PTY
///
/// Callbacks run on the PTY's reader task and must not block.
pub trait PtyEvents: Send + Sync {
    /// A chunk of decoded output
    fn on_data(&self, id: &str, data: String);

    /// The PTY closed. Called exactly once per PTY; `error` is set only for
    /// failures other than the normal end-of-stream.
    fn on_close(&self, id: &str, error: Option<PtyError>);
}

/// A live PTY plus its child process
pub trait PtyHandle: Send + Sync {
    /// OS-unique name of the PTY (the slave device path)
    fn name(&self) -> &str;

    fn pid(&self) -> i32;

    fn write(&self, data: &[u8]) -> PtyResult<()>;

    fn resize(&self, size: WindowSize) -> PtyResult<()>;

    /// Stop reading. Once the read side has closed, the child's process group
    /// receives SIGINT.
    fn shutdown(&self);

    /// Command line of the PTY's foreground process, if it can be determined
    fn foreground_process(&self) -> Option<String>;
}

/// Creates PTYs
pub trait PtyProvider: Send + Sync {
    fn fork(
        &self,
        options: &SpawnOptions,
        events: Arc<dyn PtyEvents>,
    ) -> PtyResult<Box<dyn PtyHandle>>;
}

/// Decodes a byte stream as UTF-8, carrying split codepoints across chunks
#[derive(Debug, Default)]
pub struct Utf8Stream {
    carry: Vec<u8>,
}

impl Utf8Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much as possible; an incomplete trailing codepoint waits for
    /// the next chunk, invalid bytes become U+FFFD.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.carry.len());
        let mut rest: &[u8] = &self.carry;

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.carry = rest.to_vec();
        out
    }
}
