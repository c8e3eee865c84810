//! Shared test doubles for the server tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use webtty::pty::{PtyError, PtyEvents, PtyHandle, PtyProvider, PtyResult, SpawnOptions, WindowSize};
use webtty::server::protocol::ServerMessage;
use webtty::server::{PasteSource, Transport};

/// One fake PTY; tests drive its output and exit by hand
pub struct MockPty {
    pub name: String,
    pub options: SpawnOptions,
    pub writes: Mutex<Vec<u8>>,
    pub sizes: Mutex<Vec<WindowSize>>,
    pub shutdowns: AtomicUsize,
    pub foreground: Mutex<Option<String>>,
    events: Arc<dyn PtyEvents>,
}

impl MockPty {
    pub fn emit(&self, data: &str) {
        self.events.on_data(&self.name, data.to_string());
    }

    pub fn exit(&self) {
        self.events.on_close(&self.name, None);
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.writes.lock().unwrap()).into_owned()
    }

    pub fn sizes(&self) -> Vec<WindowSize> {
        self.sizes.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

struct MockHandle(Arc<MockPty>);

impl PtyHandle for MockHandle {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn pid(&self) -> i32 {
        1000
    }

    fn write(&self, data: &[u8]) -> PtyResult<()> {
        self.0.writes.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn resize(&self, size: WindowSize) -> PtyResult<()> {
        self.0.sizes.lock().unwrap().push(size);
        Ok(())
    }

    fn shutdown(&self) {
        self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn foreground_process(&self) -> Option<String> {
        self.0.foreground.lock().unwrap().clone()
    }
}

/// Hands out `/dev/pts/0`, `/dev/pts/1`, ... and remembers every PTY it made
#[derive(Default)]
pub struct MockProvider {
    pub ptys: Mutex<Vec<Arc<MockPty>>>,
    next: AtomicUsize,
    pub fail: AtomicBool,
    /// Name every PTY `/dev/pts/0`, like a kernel recycling device numbers
    pub reuse_names: AtomicBool,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pty(&self, index: usize) -> Arc<MockPty> {
        Arc::clone(&self.ptys.lock().unwrap()[index])
    }

    pub fn count(&self) -> usize {
        self.ptys.lock().unwrap().len()
    }
}

impl PtyProvider for MockProvider {
    fn fork(
        &self,
        options: &SpawnOptions,
        events: Arc<dyn PtyEvents>,
    ) -> PtyResult<Box<dyn PtyHandle>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PtyError::InvalidArgument("mock fork failure".to_string()));
        }
        let mut n = self.next.fetch_add(1, Ordering::SeqCst);
        if self.reuse_names.load(Ordering::SeqCst) {
            n = 0;
        }
        let pty = Arc::new(MockPty {
            name: format!("/dev/pts/{n}"),
            options: options.clone(),
            writes: Mutex::new(Vec::new()),
            sizes: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
            foreground: Mutex::new(None),
            events,
        });
        self.ptys.lock().unwrap().push(Arc::clone(&pty));
        Ok(Box::new(MockHandle(pty)))
    }
}

/// Records everything sent to the client
#[derive(Default)]
pub struct RecordingTransport {
    pub messages: Mutex<Vec<ServerMessage>>,
    pub closed: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<ServerMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::Kill { id } => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, message: ServerMessage) {
        if !self.is_closed() {
            self.messages.lock().unwrap().push(message);
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Clipboard with fixed contents
pub struct FixedPaste(pub &'static str);

impl PasteSource for FixedPaste {
    fn read(&self) -> webtty::server::Result<String> {
        Ok(self.0.to_string())
    }
}

/// Poll `cond` until it holds or two seconds pass
pub async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
