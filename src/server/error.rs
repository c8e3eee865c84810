//! Errors reported by the multiplexer and registry

use crate::pty::PtyError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A create request would exceed the per-connection or global PTY limit
    #[error("Terminal limit reached")]
    ResourceLimitExceeded,

    #[error("No such terminal: {0}")]
    UnknownTerminalId(String),

    /// The connection has been torn down; no new sessions are accepted
    #[error("Connection closed")]
    Closed,

    #[error("Clipboard is not available")]
    PasteSourceUnavailable,

    #[error("PTY error: {0}")]
    Pty(#[from] PtyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
