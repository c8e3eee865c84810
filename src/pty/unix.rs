//! Unix PTY implementation
//!
//! Implements PTY creation and child process management using POSIX APIs.
//! One tokio task per PTY owns the non-blocking master through `AsyncFd`: it
//! forwards output and drains queued input whenever the master is writable, so
//! no caller ever blocks on a full tty buffer.

use std::ffi::CString;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::{Arc, RwLock};

use nix::errno::Errno;
use nix::fcntl::{fcntl, open, FcntlArg, OFlag};
use nix::libc::{self, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::pty::{grantpt, posix_openpt, ptsname, unlockpt, PtyMaster};
use nix::sys::signal::{killpg, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::waitpid;
use nix::unistd::{chdir, close, dup2, execvpe, fork, read, setsid, tcgetpgrp, write, ForkResult, Pid};
use tokio::io::unix::AsyncFd;
use tokio::sync::{mpsc, Notify};

use super::{PtyError, PtyEvents, PtyHandle, PtyProvider, PtyResult, SpawnOptions, Utf8Stream, WindowSize};

const READ_BUFFER_SIZE: usize = 65536;

/// A pseudoterminal with a spawned child process
pub struct Pty {
    master: PtyMaster,
    child_pid: Pid,
    /// Slave device path, e.g. `/dev/pts/3`
    name: String,
}

/// Arguments converted up front; the child must not allocate after fork
struct ExecArgs {
    program: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
    cwd: Option<CString>,
}

impl ExecArgs {
    fn new(options: &SpawnOptions) -> PtyResult<Self> {
        let cstring = |s: &str| CString::new(s).map_err(|_| PtyError::InvalidArgument(s.to_string()));

        let program = cstring(&options.shell)?;
        let mut argv = Vec::with_capacity(options.args.len() + 1);
        argv.push(program.clone());
        for arg in &options.args {
            argv.push(cstring(arg)?);
        }

        let mut env: std::collections::BTreeMap<String, String> = std::env::vars().collect();
        env.extend(options.env.clone());
        env.insert("TERM".to_string(), options.term_name.clone());
        let envp = env
            .iter()
            .map(|(k, v)| cstring(&format!("{}={}", k, v)))
            .collect::<PtyResult<Vec<_>>>()?;

        let cwd = options.cwd.as_deref().map(cstring).transpose()?;

        Ok(Self {
            program,
            argv,
            envp,
            cwd,
        })
    }
}

impl Pty {
    /// Spawn a child on a new PTY
    pub fn spawn(options: &SpawnOptions) -> PtyResult<Self> {
        let exec = ExecArgs::new(options)?;

        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(PtyError::OpenMaster)?;
        grantpt(&master).map_err(PtyError::GrantPty)?;
        unlockpt(&master).map_err(PtyError::UnlockPty)?;

        // SAFETY: ptsname is not thread-safe; the name is copied out immediately
        let slave_name = unsafe { ptsname(&master) }.map_err(PtyError::PtsName)?;
        let slave_cstr = CString::new(slave_name.as_str())
            .map_err(|_| PtyError::InvalidArgument(slave_name.clone()))?;

        set_window_size(master.as_raw_fd(), options.size)?;

        // SAFETY: the child only calls async-signal-safe functions before exec
        match unsafe { fork() }.map_err(PtyError::Fork)? {
            ForkResult::Child => {
                drop(master);
                exec_child(&slave_cstr, &exec);
            }
            ForkResult::Parent { child } => {
                let flags = fcntl(master.as_raw_fd(), FcntlArg::F_GETFL)
                    .map_err(PtyError::SetNonBlocking)?;
                let flags = OFlag::from_bits_truncate(flags);
                fcntl(
                    master.as_raw_fd(),
                    FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK),
                )
                .map_err(PtyError::SetNonBlocking)?;

                tracing::debug!(pid = child.as_raw(), name = %slave_name, "spawned pty child");
                Ok(Pty {
                    master,
                    child_pid: child,
                    name: slave_name,
                })
            }
        }
    }

    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    pub fn child_pid(&self) -> Pid {
        self.child_pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Runs in the forked child; never returns
fn exec_child(slave: &CString, exec: &ExecArgs) -> ! {
    if setsid().is_err() {
        fail();
    }
    let slave_fd = match open(slave.as_c_str(), OFlag::O_RDWR, Mode::empty()) {
        Ok(fd) => fd,
        Err(_) => fail(),
    };

    // SAFETY: TIOCSCTTY is a valid ioctl for setting the controlling terminal.
    // Failure is tolerated; opening the slave after setsid usually suffices.
    unsafe {
        libc::ioctl(slave_fd, libc::TIOCSCTTY as _, 0);
    }

    for target in [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO] {
        if dup2(slave_fd, target).is_err() {
            fail();
        }
    }
    if slave_fd > STDERR_FILENO {
        let _ = close(slave_fd);
    }

    if let Some(cwd) = &exec.cwd {
        // A bad cwd leaves the child in the server's directory
        let _ = chdir(cwd.as_c_str());
    }

    let _ = execvpe(&exec.program, &exec.argv, &exec.envp);
    fail()
}

fn fail() -> ! {
    // SAFETY: _exit is async-signal-safe
    unsafe { libc::_exit(127) }
}

/// Set the window size on a PTY file descriptor
fn set_window_size(fd: RawFd, size: WindowSize) -> PtyResult<()> {
    let winsize = libc::winsize {
        ws_row: size.rows,
        ws_col: size.cols,
        ws_xpixel: size.pixel_width,
        ws_ypixel: size.pixel_height,
    };

    // SAFETY: TIOCSWINSZ is a valid ioctl for setting window size
    let result = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &winsize) };

    if result < 0 {
        Err(PtyError::SetWinsize(Errno::last()))
    } else {
        Ok(())
    }
}

/// Get the window size from a PTY file descriptor
pub fn get_window_size(fd: RawFd) -> PtyResult<WindowSize> {
    let mut winsize = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    // SAFETY: TIOCGWINSZ is a valid ioctl for getting window size
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut winsize) };

    if result < 0 {
        Err(PtyError::SetWinsize(Errno::last()))
    } else {
        Ok(WindowSize {
            rows: winsize.ws_row,
            cols: winsize.ws_col,
            pixel_width: winsize.ws_xpixel,
            pixel_height: winsize.ws_ypixel,
        })
    }
}

/// State shared between a [`UnixPtyHandle`] and its reader task
struct Shared {
    name: String,
    pid: Pid,
    shell: String,
    /// The master fd while it is open; the reader clears it before closing
    master: RwLock<Option<RawFd>>,
    stop: Notify,
}

impl Shared {
    fn with_master<T>(&self, f: impl FnOnce(RawFd) -> PtyResult<T>) -> PtyResult<T> {
        let guard = self.master.read().map_err(|_| PtyError::Closed)?;
        match *guard {
            Some(fd) => f(fd),
            None => Err(PtyError::Closed),
        }
    }
}

/// Handle to a PTY spawned by [`UnixPtyProvider`]
pub struct UnixPtyHandle {
    shared: Arc<Shared>,
    input: mpsc::UnboundedSender<Vec<u8>>,
}

impl PtyHandle for UnixPtyHandle {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn pid(&self) -> i32 {
        self.shared.pid.as_raw()
    }

    fn write(&self, data: &[u8]) -> PtyResult<()> {
        self.shared.with_master(|_| {
            self.input
                .send(data.to_vec())
                .map_err(|_| PtyError::Closed)
        })
    }

    fn resize(&self, size: WindowSize) -> PtyResult<()> {
        self.shared.with_master(|fd| set_window_size(fd, size))
    }

    fn shutdown(&self) {
        self.shared.stop.notify_one();
    }

    fn foreground_process(&self) -> Option<String> {
        let pgrp = self.shared.with_master(|fd| tcgetpgrp(fd).map_err(PtyError::Read)).ok()?;
        let cmdline = std::fs::read(format!("/proc/{}/cmdline", pgrp.as_raw())).ok()?;
        let cmdline: String = String::from_utf8_lossy(&cmdline)
            .split('\0')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if cmdline.is_empty() {
            Some(self.shared.shell.clone())
        } else {
            Some(cmdline)
        }
    }
}

/// Forks real PTYs; must be used from within a tokio runtime
#[derive(Debug, Default, Clone)]
pub struct UnixPtyProvider;

impl PtyProvider for UnixPtyProvider {
    fn fork(
        &self,
        options: &SpawnOptions,
        events: Arc<dyn PtyEvents>,
    ) -> PtyResult<Box<dyn PtyHandle>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PtyError::Io(std::io::Error::other(e)))?;

        let pty = Pty::spawn(options)?;
        let shared = Arc::new(Shared {
            name: pty.name.clone(),
            pid: pty.child_pid,
            shell: options.shell.clone(),
            master: RwLock::new(Some(pty.master_fd())),
            stop: Notify::new(),
        });

        let (input, queued) = mpsc::unbounded_channel();
        runtime.spawn(io_loop(pty, Arc::clone(&shared), queued, events));
        Ok(Box::new(UnixPtyHandle { shared, input }))
    }
}

enum ReadEnd {
    Eof,
    Failed(PtyError),
    Stopped,
}

/// Pump output and queued input until EOF, an error, or shutdown, then report
/// the close and release the master
async fn io_loop(
    pty: Pty,
    shared: Arc<Shared>,
    mut queued: mpsc::UnboundedReceiver<Vec<u8>>,
    events: Arc<dyn PtyEvents>,
) {
    let Pty {
        master, child_pid, ..
    } = pty;

    let (end, master) = match AsyncFd::new(master) {
        Ok(async_fd) => {
            let end = pump(&async_fd, &shared, &mut queued, events.as_ref()).await;
            (end, Some(async_fd.into_inner()))
        }
        Err(e) => {
            if let Ok(mut guard) = shared.master.write() {
                *guard = None;
            }
            (ReadEnd::Failed(PtyError::Io(e)), None)
        }
    };
    // Writes from here on fail with `Closed`
    drop(queued);

    let stopped = matches!(end, ReadEnd::Stopped);
    let error = match end {
        ReadEnd::Failed(e) => {
            tracing::error!(name = %shared.name, error = %e, "pty read failed");
            Some(e)
        }
        ReadEnd::Eof | ReadEnd::Stopped => None,
    };
    // The device name stays taken until the master closes, so the owner never
    // sees this close after the OS has handed the name to a newer PTY
    events.on_close(&shared.name, error);
    if let Some(master) = master {
        close_master(&shared, master);
    }

    if stopped {
        // Never SIGKILL; the shell gets a chance to clean up
        if let Err(e) = killpg(child_pid, Signal::SIGINT) {
            tracing::debug!(pid = child_pid.as_raw(), error = %e, "SIGINT to process group failed");
        }
    }

    // Reap the child so it doesn't linger as a zombie
    let reaped = tokio::task::spawn_blocking(move || waitpid(child_pid, None)).await;
    tracing::debug!(pid = child_pid.as_raw(), status = ?reaped, "pty child reaped");
}

async fn pump(
    async_fd: &AsyncFd<PtyMaster>,
    shared: &Shared,
    queued: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    events: &dyn PtyEvents,
) -> ReadEnd {
    let fd = async_fd.get_ref().as_raw_fd();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut decoder = Utf8Stream::new();
    // Input accepted from the handle but not yet taken by the tty
    let mut pending: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            _ = shared.stop.notified() => return ReadEnd::Stopped,
            ready = async_fd.readable() => {
                let mut guard = match ready {
                    Ok(guard) => guard,
                    Err(e) => return ReadEnd::Failed(PtyError::Io(e)),
                };
                match read(fd, &mut buf) {
                    Ok(0) => return ReadEnd::Eof,
                    Ok(n) => {
                        let text = decoder.decode(&buf[..n]);
                        if !text.is_empty() {
                            events.on_data(&shared.name, text);
                        }
                    }
                    Err(Errno::EAGAIN) => guard.clear_ready(),
                    Err(Errno::EINTR) => {}
                    // The slave side closed: the child exited
                    Err(Errno::EIO) => return ReadEnd::Eof,
                    Err(e) => return ReadEnd::Failed(PtyError::Read(e)),
                }
            }
            Some(data) = queued.recv() => pending.extend_from_slice(&data),
            ready = async_fd.writable(), if !pending.is_empty() => {
                let mut guard = match ready {
                    Ok(guard) => guard,
                    Err(e) => return ReadEnd::Failed(PtyError::Io(e)),
                };
                match write(fd, &pending) {
                    Ok(n) => {
                        pending.drain(..n);
                    }
                    Err(Errno::EAGAIN) => guard.clear_ready(),
                    Err(Errno::EINTR) => {}
                    Err(e) => {
                        // The reader sees the same condition and ends the loop
                        tracing::warn!(name = %shared.name, error = %e, dropped = pending.len(), "pty write failed");
                        pending.clear();
                    }
                }
            }
        }
    }
}

fn close_master(shared: &Shared, master: PtyMaster) {
    // Hold the lock across the close so no writer can use a recycled fd
    match shared.master.write() {
        Ok(mut guard) => {
            *guard = None;
            drop(master);
        }
        Err(_) => drop(master),
    }
}
