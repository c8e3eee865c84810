//! A server-side terminal session: one PTY, one child process

use std::sync::Arc;

use super::{PtyEvents, PtyHandle, PtyProvider, PtyResult, SpawnOptions, WindowSize};

/// Reduce a command line to a short label: the first word, without its directory
///
/// `"/usr/bin/vim -O a b"` becomes `"vim"`.
pub fn sanitize_process_name(command: &str) -> String {
    let first = command.split_whitespace().next().unwrap_or("");
    first.rsplit('/').next().unwrap_or(first).to_string()
}

/// A PTY-backed process owned by one connection
pub struct PtySession {
    id: String,
    handle: Box<dyn PtyHandle>,
    shell: String,
    size: WindowSize,
    writable: bool,
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("id", &self.id)
            .field("pid", &self.handle.pid())
            .field("size", &self.size)
            .field("writable", &self.writable)
            .finish()
    }
}

impl PtySession {
    /// Fork a new session; output and exit are reported through `events`
    pub fn spawn(
        provider: &dyn PtyProvider,
        options: &SpawnOptions,
        events: Arc<dyn PtyEvents>,
    ) -> PtyResult<Self> {
        let handle = provider.fork(options, events)?;
        tracing::info!(id = handle.name(), pid = handle.pid(), shell = %options.shell, "created pty session");
        Ok(Self {
            id: handle.name().to_string(),
            handle,
            shell: options.shell.clone(),
            size: options.size,
            writable: true,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pid(&self) -> i32 {
        self.handle.pid()
    }

    pub fn size(&self) -> WindowSize {
        self.size
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Best-effort write; a no-op once destroyed
    pub fn write(&self, data: &[u8]) {
        if !self.writable {
            return;
        }
        if let Err(e) = self.handle.write(data) {
            tracing::warn!(id = %self.id, error = %e, "pty write failed");
        }
    }

    /// Record the new size and propagate it to the PTY
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.size = WindowSize::new(cols, rows);
        self.apply_size(self.size);
    }

    /// Push a size to the PTY without recording it (used by the redraw nudge)
    pub fn apply_size(&self, size: WindowSize) {
        if !self.writable {
            return;
        }
        if let Err(e) = self.handle.resize(size) {
            tracing::warn!(id = %self.id, error = %e, "pty resize failed");
        }
    }

    /// Stop the session; idempotent
    pub fn destroy(&mut self) {
        if !self.writable {
            return;
        }
        self.writable = false;
        self.handle.shutdown();
        tracing::info!(id = %self.id, "destroyed pty session");
    }

    /// Label for the foreground process, falling back to the shell
    pub fn process_label(&self) -> String {
        let command = self
            .handle
            .foreground_process()
            .unwrap_or_else(|| self.shell.clone());
        sanitize_process_name(&command)
    }
}
