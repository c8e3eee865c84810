//! Maps stable identities to their multiplexers so PTYs survive reconnects

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::multiplexer::{ConnectionMultiplexer, Context, SessionCounter, Transport};
use super::paste::PasteSource;
use super::ServerOptions;
use crate::pty::PtyProvider;

/// Result of binding a connection to a multiplexer
#[derive(Debug, Clone)]
pub struct Attachment {
    pub multiplexer: ConnectionMultiplexer,
    /// Pass back to [`ConnectionMultiplexer::disconnect`] when the connection ends
    pub generation: u64,
    /// True when an existing multiplexer was taken over
    pub resumed: bool,
}

struct Inner {
    context: Context,
    multiplexers: Mutex<HashMap<String, ConnectionMultiplexer>>,
    /// Per-connection multiplexers by serial, dropped when their connection closes
    ephemeral: Mutex<HashMap<u64, ConnectionMultiplexer>>,
    next_serial: AtomicU64,
}

/// Owner of the global PTY counter and of every live multiplexer
#[derive(Clone)]
pub struct ServerRegistry {
    inner: Arc<Inner>,
}

impl ServerRegistry {
    pub fn new(
        options: ServerOptions,
        provider: Arc<dyn PtyProvider>,
        paste: Arc<dyn PasteSource>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                context: Context {
                    options: Arc::new(options),
                    provider,
                    paste,
                    counter: SessionCounter::new(),
                },
                multiplexers: Mutex::new(HashMap::new()),
                ephemeral: Mutex::new(HashMap::new()),
                next_serial: AtomicU64::new(1),
            }),
        }
    }

    fn multiplexers(&self) -> MutexGuard<'_, HashMap<String, ConnectionMultiplexer>> {
        self.inner
            .multiplexers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ephemeral(&self) -> MutexGuard<'_, HashMap<u64, ConnectionMultiplexer>> {
        lock_ephemeral(&self.inner)
    }

    pub fn options(&self) -> &ServerOptions {
        &self.inner.context.options
    }

    /// Bind a new connection
    ///
    /// With resume enabled and a stable identity, a live multiplexer for that
    /// identity is taken over; otherwise a fresh one is made. Connections
    /// without an identity, or any connection when resume is off, get an
    /// ephemeral multiplexer that is only tracked until its connection ends.
    pub fn attach(&self, identity: Option<&str>, transport: Arc<dyn Transport>) -> Attachment {
        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);

        let identity = match identity {
            Some(identity) if self.inner.context.options.resume => identity,
            _ => {
                let multiplexer = ConnectionMultiplexer::new(
                    format!("conn-{serial}"),
                    serial,
                    false,
                    self.inner.context.clone(),
                    transport,
                );
                multiplexer.set_on_expire(forget_ephemeral(Arc::downgrade(&self.inner), serial));
                self.ephemeral().insert(serial, multiplexer.clone());
                tracing::info!(key = multiplexer.key(), "new connection");
                return Attachment {
                    generation: multiplexer.generation(),
                    multiplexer,
                    resumed: false,
                };
            }
        };

        let mut multiplexers = self.multiplexers();
        if let Some(existing) = multiplexers.get(identity) {
            if let Some(generation) = existing.reattach(Arc::clone(&transport)) {
                return Attachment {
                    multiplexer: existing.clone(),
                    generation,
                    resumed: true,
                };
            }
        }

        let multiplexer = ConnectionMultiplexer::new(
            identity.to_string(),
            serial,
            true,
            self.inner.context.clone(),
            transport,
        );
        multiplexer.set_on_expire(expiry_hook(
            Arc::downgrade(&self.inner),
            identity.to_string(),
            serial,
        ));
        multiplexers.insert(identity.to_string(), multiplexer.clone());
        tracing::info!(key = identity, "new resumable connection");

        Attachment {
            generation: multiplexer.generation(),
            multiplexer,
            resumed: false,
        }
    }

    /// The registered multiplexer for `identity`
    pub fn get(&self, identity: &str) -> Option<ConnectionMultiplexer> {
        self.multiplexers().get(identity).cloned()
    }

    /// Number of registered (resumable) multiplexers
    pub fn len(&self) -> usize {
        self.multiplexers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live multiplexers, resumable and ephemeral
    pub fn connections(&self) -> usize {
        self.len() + self.ephemeral().len()
    }

    /// PTYs alive across every multiplexer
    pub fn live_sessions(&self) -> usize {
        self.inner.context.counter.get()
    }

    /// Destroy the sessions of every live multiplexer
    pub fn shutdown(&self) {
        let mut drained: Vec<ConnectionMultiplexer> =
            self.multiplexers().drain().map(|(_, m)| m).collect();
        drained.extend(self.ephemeral().drain().map(|(_, m)| m));
        tracing::info!(connections = drained.len(), "shutting down");
        for multiplexer in drained {
            multiplexer.shutdown();
        }
    }
}

/// Removes the multiplexer from the registry once its grace period runs out,
/// unless a newer multiplexer already took its place
fn expiry_hook(registry: Weak<Inner>, key: String, serial: u64) -> Box<dyn FnOnce() + Send> {
    Box::new(move || {
        let Some(inner) = registry.upgrade() else {
            return;
        };
        let mut multiplexers = inner
            .multiplexers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if multiplexers.get(&key).map(|m| m.serial()) == Some(serial) {
            multiplexers.remove(&key);
        }
    })
}

/// Drops an ephemeral multiplexer once its connection has gone
fn forget_ephemeral(registry: Weak<Inner>, serial: u64) -> Box<dyn FnOnce() + Send> {
    Box::new(move || {
        if let Some(inner) = registry.upgrade() {
            lock_ephemeral(&inner).remove(&serial);
        }
    })
}

fn lock_ephemeral(inner: &Inner) -> MutexGuard<'_, HashMap<u64, ConnectionMultiplexer>> {
    inner
        .ephemeral
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}
