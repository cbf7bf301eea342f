use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use signal_hook::consts::signal::SIGTERM;

use crate::error::{DaemonError, DaemonResult};
use crate::pidfile::PidLockFile;
use crate::stdio::Stdio;
use crate::sys::{StdStream, System, UnixSystem};

/// Lifecycle of a context within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    New,
    /// The calling process is the daemon. There is no way back.
    Started,
}

/// Context for turning the current program into a daemon process.
///
/// Built once, before any OS interaction. [`start`](Self::start) turns the
/// calling process into the daemon; [`stop`](Self::stop) is meant for a
/// separate, short-lived controller process and signals the daemon
/// recorded in the PID file.
pub struct DaemonContext<S: System> {
    pub(crate) directory: PathBuf,
    pub(crate) umask: u32,
    pub(crate) stdin: Stdio,
    pub(crate) stdout: Stdio,
    pub(crate) stderr: Option<Stdio>,
    pub(crate) pid_file: Option<PidLockFile>,
    pub(crate) stop_signal: i32,
    pub(crate) supervisor_aware: bool,
    pub(crate) state: ContextState,
    pub(crate) system: S,
}

impl<S: System> fmt::Debug for DaemonContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonContext")
            .field("directory", &self.directory)
            .field("umask", &format_args!("{:#o}", self.umask))
            .field("stdin", &self.stdin)
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .field("pid_file", &self.pid_file)
            .field("stop_signal", &self.stop_signal)
            .field("supervisor_aware", &self.supervisor_aware)
            .field("state", &self.state)
            .finish()
    }
}

impl Default for DaemonContext<UnixSystem> {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonContext<UnixSystem> {
    /// Creates a new default configuration backed by the real OS.
    ///
    /// # Defaults
    /// - Working directory: `.` (stay where the process was started)
    /// - Umask: `0`
    /// - stdin/stdout: `/dev/null`, stderr: same target as stdout
    /// - Stop signal: `SIGTERM`
    pub fn new() -> Self {
        Self::with_system(UnixSystem::new())
    }
}

impl<S: System> DaemonContext<S> {
    /// Creates a default configuration on top of a custom platform layer.
    pub fn with_system(system: S) -> Self {
        DaemonContext {
            directory: PathBuf::from("."),
            umask: 0,
            stdin: Stdio::devnull(),
            stdout: Stdio::devnull(),
            stderr: None,
            pid_file: None,
            stop_signal: SIGTERM,
            supervisor_aware: true,
            state: ContextState::New,
            system,
        }
    }

    // --- Public Getters ---

    pub fn working_directory_path(&self) -> &Path {
        &self.directory
    }

    pub fn umask_value(&self) -> u32 {
        self.umask
    }

    pub fn stdin_target(&self) -> &Stdio {
        &self.stdin
    }

    pub fn stdout_target(&self) -> &Stdio {
        &self.stdout
    }

    /// `None` until `start` resolves an absent error target to stdout's.
    pub fn stderr_target(&self) -> Option<&Stdio> {
        self.stderr.as_ref()
    }

    pub fn pid_lock_file(&self) -> Option<&PidLockFile> {
        self.pid_file.as_ref()
    }

    pub fn stop_signal_value(&self) -> i32 {
        self.stop_signal
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    // --- Builder Methods ---

    /// Sets the working directory the daemon changes into.
    pub fn working_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.directory = path.into();
        self
    }

    /// Sets the file-creation mask for the daemon process.
    pub fn umask(mut self, mask: u32) -> Self {
        self.umask = mask;
        self
    }

    pub fn stdin<T: Into<Stdio>>(mut self, stdio: T) -> Self {
        self.stdin = stdio.into();
        self
    }

    pub fn stdout<T: Into<Stdio>>(mut self, stdio: T) -> Self {
        self.stdout = stdio.into();
        self
    }

    /// Sets the error stream target. Left unset, it follows stdout.
    pub fn stderr<T: Into<Stdio>>(mut self, stdio: T) -> Self {
        self.stderr = Some(stdio.into());
        self
    }

    /// Sets the path of the PID file used for locking and for `stop`.
    pub fn pid_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.pid_file = Some(PidLockFile::new(path));
        self
    }

    /// Sets the signal `stop` delivers to the running daemon.
    pub fn stop_signal(mut self, signal: i32) -> Self {
        self.stop_signal = signal;
        self
    }

    /// If `true` (the default) and a service manager supervises the process,
    /// `start` stays in the foreground and reports readiness instead of forking.
    pub fn supervisor_aware(mut self, aware: bool) -> Self {
        self.supervisor_aware = aware;
        self
    }

    /// Checks the configuration without touching the process.
    /// The PID file directory and the working directory must exist.
    pub fn validate(&self) -> DaemonResult<()> {
        if let Some(lock) = &self.pid_file {
            let parent = lock.path().parent().filter(|p| !p.as_os_str().is_empty());
            if parent.map(|p| !p.is_dir()).unwrap_or(false) {
                return Err(DaemonError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    "PID file directory does not exist",
                )));
            }
        }
        if !self.directory.is_dir() {
            return Err(DaemonError::Chdir {
                path: self.directory.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "working directory does not exist"),
            });
        }
        Ok(())
    }

    /// Fails with `AlreadyLocked` if the configured PID file exists.
    /// Touches nothing, so callers can run it before any other preparation.
    pub fn ensure_unlocked(&self) -> DaemonResult<()> {
        match &self.pid_file {
            Some(lock) if lock.is_locked() => {
                if lock.is_stale() {
                    tracing::warn!(path = %lock.path().display(), "PID file exists but no live process holds it");
                }
                Err(DaemonError::AlreadyLocked(lock.path().to_path_buf()))
            }
            _ => Ok(()),
        }
    }

    /// Becomes a daemon process.
    ///
    /// Irreversible: on success the caller is the detached grandchild and
    /// must go on to run the application. The launching process and the
    /// intermediate child have already exited. Nothing happens to the
    /// process when the PID file is already locked.
    pub fn start(&mut self) -> DaemonResult<()> {
        if self.state == ContextState::Started {
            return Err(DaemonError::AlreadyStarted);
        }
        self.ensure_unlocked()?;
        self.validate()?;

        let supervised = self.supervisor_aware && self.system.is_supervised();
        if supervised {
            tracing::debug!("supervised by a service manager, staying in the foreground");
        } else {
            self.system.detach()?;
        }
        self.state = ContextState::Started;

        self.system.change_directory(&self.directory)?;
        self.system.set_umask(self.umask);
        tracing::debug!(directory = %self.directory.display(), umask = self.umask, "environment reset");

        self.system.suppress_core_dumps()?;

        let stderr = self.stderr.get_or_insert_with(|| self.stdout.clone()).clone();

        let pid = self.system.current_pid();
        self.system.announce(&format!("started with pid {}", pid))?;
        tracing::info!(pid = %pid, "daemon started");

        if let Some(lock) = self.pid_file.as_mut() {
            lock.acquire_for(pid)?;
        }

        self.system.redirect(StdStream::Input, &self.stdin)?;
        self.system.redirect(StdStream::Output, &self.stdout)?;
        self.system.redirect(StdStream::Error, &stderr)?;

        if supervised {
            self.system.notify_ready()?;
        }
        Ok(())
    }

    /// Stops the running daemon recorded in the PID file.
    ///
    /// Removes the PID file, then sends the stop signal. Returns once the
    /// signal is sent; the daemon may still be shutting down.
    pub fn stop(&mut self) -> DaemonResult<()> {
        let lock = self.pid_file.as_mut().ok_or(DaemonError::NoPidFile)?;
        if !lock.is_locked() {
            return Err(DaemonError::NotRunning(lock.path().to_path_buf()));
        }

        if lock.is_stale() {
            tracing::warn!(path = %lock.path().display(), "PID file not held by a live process, signalling anyway");
        }
        let pid = lock.read_pid()?;
        lock.release()?;
        self.system.send_signal(pid, self.stop_signal)?;
        tracing::info!(pid = %pid, signal = self.stop_signal, "stop signal sent");
        Ok(())
    }
}
