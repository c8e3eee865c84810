//! Server side: per-connection PTY multiplexing, resume, and the TCP front end
//!
//! A [`ServerRegistry`] hands every incoming connection a
//! [`ConnectionMultiplexer`]. Connections that present a stable identity (and
//! run with resume enabled) keep their multiplexer, and with it their PTYs,
//! across reconnects within the grace period.

mod error;
pub mod listener;
mod multiplexer;
mod paste;
pub mod protocol;
mod registry;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::pty::{SpawnOptions, WindowSize};

pub use error::{Error, Result};
pub use multiplexer::{ConnectionMultiplexer, SessionCounter, Transport};
pub use paste::{NoPaste, PasteSource, SystemPaste};
pub use registry::{Attachment, ServerRegistry};

/// Delay between the two halves of the redraw nudge sent on reconnection
pub const NUDGE_DELAY: Duration = Duration::from_millis(30);

/// Default time a disconnected, resumable connection keeps its PTYs
pub const DEFAULT_GRACE: Duration = Duration::from_secs(30);

/// Settings shared by every multiplexer, read once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub shell: String,
    pub shell_args: Vec<String>,
    pub cwd: Option<String>,
    pub term_name: String,
    pub env: BTreeMap<String, String>,
    /// Maximum PTYs per connection; `None` is unbounded
    pub limit_per_user: Option<usize>,
    /// Maximum PTYs across the whole server; `None` is unbounded
    pub limit_global: Option<usize>,
    pub resume: bool,
    pub grace: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            shell_args: Vec::new(),
            cwd: None,
            term_name: "xterm".to_string(),
            env: BTreeMap::new(),
            limit_per_user: None,
            limit_global: None,
            resume: false,
            grace: DEFAULT_GRACE,
        }
    }
}

impl ServerOptions {
    pub fn spawn_options(&self, cols: u16, rows: u16) -> SpawnOptions {
        SpawnOptions {
            shell: self.shell.clone(),
            args: self.shell_args.clone(),
            size: WindowSize::new(cols, rows),
            cwd: self.cwd.clone(),
            env: self.env.clone(),
            term_name: self.term_name.clone(),
        }
    }
}
