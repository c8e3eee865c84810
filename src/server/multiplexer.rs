//! One client's set of PTY sessions
//!
//! All mutations go through a single mutex that is never held across an
//! `.await`. PTY callbacks reach the multiplexer through a weak reference and
//! carry the serial of the session they were created for. They only act on a
//! registered session with the same serial, so a `kill` racing with in-flight
//! output, or a late exit of a PTY whose name the OS already reused, is
//! harmless.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::AbortHandle;

use super::error::{Error, Result};
use super::paste::PasteSource;
use super::protocol::{CreateResult, ServerMessage, TermInfo};
use super::{ServerOptions, NUDGE_DELAY};
use crate::pty::{
    sanitize_process_name, PtyError, PtyEvents, PtyProvider, PtySession, WindowSize,
};

/// Outgoing half of a client connection
pub trait Transport: Send + Sync {
    /// Queue a message; silently dropped once the transport is closed
    fn send(&self, message: ServerMessage);

    /// Tear the connection down
    fn close(&self);
}

/// Live PTY count shared by every multiplexer of a registry
#[derive(Debug, Clone, Default)]
pub struct SessionCounter(Arc<AtomicUsize>);

impl SessionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Take one slot unless that would exceed `limit`
    pub fn try_acquire(&self, limit: Option<usize>) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match limit {
                Some(limit) if n >= limit => None,
                _ => Some(n + 1),
            })
            .is_ok()
    }

    pub fn release(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

/// Everything a multiplexer borrows from its registry
#[derive(Clone)]
pub(crate) struct Context {
    pub options: Arc<ServerOptions>,
    pub provider: Arc<dyn PtyProvider>,
    pub paste: Arc<dyn PasteSource>,
    pub counter: SessionCounter,
}

type ExpireHook = Box<dyn FnOnce() + Send>;

/// A registered session and the serial its PTY callbacks carry
struct Entry {
    serial: u64,
    session: PtySession,
}

struct State {
    sessions: HashMap<String, Entry>,
    transport: Arc<dyn Transport>,
    /// Bumped on every reattach; disconnects from older connections are ignored
    generation: u64,
    grace_timer: Option<AbortHandle>,
    closed: bool,
}

struct Shared {
    key: String,
    serial: u64,
    resumable: bool,
    context: Context,
    state: Mutex<State>,
    next_session: AtomicU64,
    on_expire: Mutex<Option<ExpireHook>>,
}

/// Owns the PTY sessions of one client connection (or one stable identity)
#[derive(Clone)]
pub struct ConnectionMultiplexer {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectionMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionMultiplexer")
            .field("key", &self.shared.key)
            .field("resumable", &self.shared.resumable)
            .field("sessions", &self.len())
            .finish()
    }
}

impl ConnectionMultiplexer {
    pub(crate) fn new(
        key: String,
        serial: u64,
        resumable: bool,
        context: Context,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                key,
                serial,
                resumable,
                context,
                state: Mutex::new(State {
                    sessions: HashMap::new(),
                    transport,
                    generation: 0,
                    grace_timer: None,
                    closed: false,
                }),
                next_session: AtomicU64::new(1),
                on_expire: Mutex::new(None),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Identity key, or a per-connection label for ephemeral multiplexers
    pub fn key(&self) -> &str {
        &self.shared.key
    }

    pub(crate) fn serial(&self) -> u64 {
        self.shared.serial
    }

    pub fn is_resumable(&self) -> bool {
        self.shared.resumable
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Number of owned sessions
    pub fn len(&self) -> usize {
        self.state().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state().sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub(crate) fn set_on_expire(&self, hook: ExpireHook) {
        *self
            .shared
            .on_expire
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    /// Fork a new PTY sized `cols`×`rows`
    ///
    /// Refused with [`Error::ResourceLimitExceeded`] and no state change when
    /// either the per-connection or the global limit is reached.
    pub fn create(&self, cols: u16, rows: u16) -> Result<CreateResult> {
        let options = &self.shared.context.options;
        let counter = &self.shared.context.counter;

        let mut state = self.state();
        if state.closed {
            return Err(Error::Closed);
        }
        if let Some(limit) = options.limit_per_user {
            if state.sessions.len() >= limit {
                tracing::warn!(key = %self.shared.key, limit, "per-connection terminal limit reached");
                return Err(Error::ResourceLimitExceeded);
            }
        }
        if !counter.try_acquire(options.limit_global) {
            tracing::warn!(key = %self.shared.key, live = counter.get(), "global terminal limit reached");
            return Err(Error::ResourceLimitExceeded);
        }

        let serial = self.shared.next_session.fetch_add(1, Ordering::Relaxed);
        let events = Arc::new(SessionEvents {
            multiplexer: Arc::downgrade(&self.shared),
            serial,
        });
        let spawn = options.spawn_options(cols, rows);
        let session =
            match PtySession::spawn(self.shared.context.provider.as_ref(), &spawn, events) {
                Ok(session) => session,
                Err(e) => {
                    counter.release();
                    tracing::error!(key = %self.shared.key, error = %e, "failed to create pty");
                    return Err(e.into());
                }
            };

        let result = CreateResult {
            id: session.id().to_string(),
            process: sanitize_process_name(&options.shell),
        };
        let entry = Entry { serial, session };
        if let Some(mut replaced) = state.sessions.insert(result.id.clone(), entry) {
            // The OS reused a PTY name we still held; the old one is gone
            tracing::warn!(id = %result.id, "pty name reused, dropping stale session");
            replaced.session.destroy();
            counter.release();
        }
        Ok(result)
    }

    /// Forward input to a session
    ///
    /// The bytes are queued on the PTY; the call never waits for the child to
    /// read them.
    pub fn write(&self, id: &str, data: &str) -> Result<()> {
        let state = self.state();
        match state.sessions.get(id) {
            Some(entry) => {
                entry.session.write(data.as_bytes());
                Ok(())
            }
            None => Err(Error::UnknownTerminalId(id.to_string())),
        }
    }

    /// Resize a session; unknown ids are ignored
    pub fn resize(&self, id: &str, cols: u16, rows: u16) {
        let mut state = self.state();
        match state.sessions.get_mut(id) {
            Some(entry) => entry.session.resize(cols, rows),
            None => tracing::debug!(id, "resize for unknown terminal"),
        }
    }

    /// Destroy and forget a session; unknown or already killed ids are ignored
    pub fn kill(&self, id: &str) {
        let removed = self.state().sessions.remove(id);
        if let Some(mut entry) = removed {
            entry.session.destroy();
            self.shared.context.counter.release();
        }
    }

    /// Short name of the session's foreground process
    pub fn query_process_name(&self, id: &str) -> Result<String> {
        let state = self.state();
        state
            .sessions
            .get(id)
            .map(|entry| entry.session.process_label())
            .ok_or_else(|| Error::UnknownTerminalId(id.to_string()))
    }

    /// Every owned session with its recorded size and current process
    pub fn snapshot(&self) -> BTreeMap<String, TermInfo> {
        snapshot(&self.state())
    }

    /// Read the host clipboard off the async runtime
    pub async fn request_paste(&self) -> Result<String> {
        let paste = Arc::clone(&self.shared.context.paste);
        tokio::task::spawn_blocking(move || paste.read())
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }

    /// The connection that attached as `generation` went away
    ///
    /// Without resume every session is destroyed now. With resume a grace
    /// timer starts; if no reconnection supersedes it the sessions are
    /// destroyed when it fires.
    pub fn disconnect(&self, generation: u64) {
        let mut state = self.state();
        if state.closed || state.generation != generation {
            tracing::debug!(key = %self.shared.key, generation, "ignoring stale disconnect");
            return;
        }

        if !self.shared.resumable {
            self.close_locked(&mut state);
            drop(state);
            self.run_expire_hook();
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(key = %self.shared.key, "no runtime for grace timer, closing now");
                drop(state);
                self.expire(generation);
                return;
            }
        };

        if let Some(timer) = state.grace_timer.take() {
            timer.abort();
        }
        let grace = self.shared.context.options.grace;
        let weak = Arc::downgrade(&self.shared);
        let timer = runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(shared) = weak.upgrade() {
                ConnectionMultiplexer { shared }.expire(generation);
            }
        });
        state.grace_timer = Some(timer.abort_handle());
        tracing::info!(
            key = %self.shared.key,
            sessions = state.sessions.len(),
            grace_secs = grace.as_secs_f64(),
            "connection lost, holding sessions"
        );
    }

    /// Grace period ran out without a reconnection
    fn expire(&self, generation: u64) {
        {
            let mut state = self.state();
            if state.closed || state.generation != generation {
                return;
            }
            state.grace_timer = None;
            tracing::info!(key = %self.shared.key, "grace period expired");
            self.close_locked(&mut state);
        }
        self.run_expire_hook();
    }

    /// Tell the owner this multiplexer is gone; runs at most once
    fn run_expire_hook(&self) {
        let hook = self
            .shared
            .on_expire
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Bind a new connection, replacing (and closing) the previous one
    ///
    /// Sends `sync` with every surviving session and nudges each PTY to redraw
    /// by resizing it one column wider and, after [`NUDGE_DELAY`], back.
    /// Returns the new generation, or `None` if this multiplexer already
    /// closed.
    pub fn reattach(&self, transport: Arc<dyn Transport>) -> Option<u64> {
        let mut state = self.state();
        if state.closed {
            return None;
        }
        if let Some(timer) = state.grace_timer.take() {
            timer.abort();
        }
        let previous = std::mem::replace(&mut state.transport, Arc::clone(&transport));
        state.generation += 1;
        let generation = state.generation;

        let terms = snapshot(&state);
        for entry in state.sessions.values() {
            let size = entry.session.size();
            entry
                .session
                .apply_size(WindowSize::new(size.cols.saturating_add(1), size.rows));
        }
        let nudged: Vec<String> = state.sessions.keys().cloned().collect();
        drop(state);

        if !same_transport(&previous, &transport) {
            previous.close();
        }
        tracing::info!(key = %self.shared.key, generation, sessions = terms.len(), "connection resumed");
        transport.send(ServerMessage::Sync { terms });

        if !nudged.is_empty() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let weak = Arc::downgrade(&self.shared);
                    runtime.spawn(async move {
                        tokio::time::sleep(NUDGE_DELAY).await;
                        if let Some(shared) = weak.upgrade() {
                            ConnectionMultiplexer { shared }.restore_sizes(&nudged);
                        }
                    });
                }
                Err(_) => self.restore_sizes(&nudged),
            }
        }
        Some(generation)
    }

    fn restore_sizes(&self, ids: &[String]) {
        let state = self.state();
        for id in ids {
            if let Some(entry) = state.sessions.get(id) {
                entry.session.apply_size(entry.session.size());
            }
        }
    }

    /// Destroy every session and refuse further work
    pub fn shutdown(&self) {
        let mut state = self.state();
        if let Some(timer) = state.grace_timer.take() {
            timer.abort();
        }
        if !state.closed {
            self.close_locked(&mut state);
        }
    }

    fn close_locked(&self, state: &mut State) {
        state.closed = true;
        let count = state.sessions.len();
        for (_, mut entry) in state.sessions.drain() {
            entry.session.destroy();
            self.shared.context.counter.release();
        }
        tracing::info!(key = %self.shared.key, destroyed = count, "connection closed");
    }

    fn on_data(&self, id: &str, serial: u64, data: String) {
        let transport = {
            let state = self.state();
            match state.sessions.get(id) {
                Some(entry) if entry.serial == serial => Arc::clone(&state.transport),
                _ => return,
            }
        };
        transport.send(ServerMessage::Data {
            id: id.to_string(),
            data,
        });
    }

    fn on_close(&self, id: &str, serial: u64, error: Option<PtyError>) {
        let transport = {
            let mut state = self.state();
            match state.sessions.get(id) {
                Some(entry) if entry.serial == serial => {}
                Some(_) => {
                    tracing::debug!(id, serial, "ignoring close of a replaced pty");
                    return;
                }
                None => return,
            }
            state.sessions.remove(id);
            self.shared.context.counter.release();
            Arc::clone(&state.transport)
        };
        match error {
            Some(e) => tracing::error!(id, error = %e, "pty closed with error"),
            None => tracing::info!(id, "pty exited"),
        }
        transport.send(ServerMessage::Kill { id: id.to_string() });
    }
}

fn snapshot(state: &State) -> BTreeMap<String, TermInfo> {
    state
        .sessions
        .iter()
        .map(|(id, Entry { session, .. })| {
            let size = session.size();
            (
                id.clone(),
                TermInfo {
                    cols: size.cols,
                    rows: size.rows,
                    process: session.process_label(),
                },
            )
        })
        .collect()
}

fn same_transport(a: &Arc<dyn Transport>, b: &Arc<dyn Transport>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Routes PTY callbacks back to the owning multiplexer, if it still exists
struct SessionEvents {
    multiplexer: Weak<Shared>,
    serial: u64,
}

impl PtyEvents for SessionEvents {
    fn on_data(&self, id: &str, data: String) {
        if let Some(shared) = self.multiplexer.upgrade() {
            ConnectionMultiplexer { shared }.on_data(id, self.serial, data);
        }
    }

    fn on_close(&self, id: &str, error: Option<PtyError>) {
        if let Some(shared) = self.multiplexer.upgrade() {
            ConnectionMultiplexer { shared }.on_close(id, self.serial, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_respects_limit() {
        let counter = SessionCounter::new();
        assert!(counter.try_acquire(Some(2)));
        assert!(counter.try_acquire(Some(2)));
        assert!(!counter.try_acquire(Some(2)));
        assert_eq!(counter.get(), 2);

        counter.release();
        assert!(counter.try_acquire(Some(2)));
    }

    #[test]
    fn test_counter_unbounded() {
        let counter = SessionCounter::new();
        for _ in 0..100 {
            assert!(counter.try_acquire(None));
        }
        assert_eq!(counter.get(), 100);
    }

    #[test]
    fn test_counter_release_never_underflows() {
        let counter = SessionCounter::new();
        counter.release();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_counter_clones_share_count() {
        let counter = SessionCounter::new();
        let other = counter.clone();
        assert!(other.try_acquire(None));
        assert_eq!(counter.get(), 1);
    }
}
