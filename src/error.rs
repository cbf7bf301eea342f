use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Pid;

/// Error type for daemon start-up and control.
/// Tells the caller why a start, stop or restart could not complete.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Standard IO errors (opening stream targets, writing the PID file, etc.)
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Changing into the configured working directory failed.
    #[error("Cannot change working directory to {path:?}: {source}")]
    Chdir { path: PathBuf, source: io::Error },

    /// The PID file is already present, another instance owns it.
    #[error("PID file {0:?} already locked")]
    AlreadyLocked(PathBuf),

    /// `stop` found no PID file at the configured path.
    #[error("PID file {0:?} not locked")]
    NotRunning(PathBuf),

    /// `stop` was asked for, but the context has no PID file configured.
    #[error("No PID file configured, nothing to stop")]
    NoPidFile,

    /// The PID file exists but does not hold a process id.
    #[error("PID file {path:?} holds invalid content {content:?}")]
    InvalidPid { path: PathBuf, content: String },

    /// A system call (fork, setsid, dup2, setrlimit...) failed.
    #[error("Syscall '{call}' failed with errno {errno}")]
    Syscall { call: &'static str, errno: i32 },

    /// Delivering the stop signal to the recorded owner failed.
    #[error("Failed to send signal {signal} to pid {pid}: {source}")]
    Signal {
        pid: Pid,
        signal: i32,
        source: io::Error,
    },

    /// `start` was called on a context that already daemonized.
    #[error("Daemon context already started")]
    AlreadyStarted,

    /// Bad command line.
    #[error("{0}")]
    Usage(#[from] clap::Error),

    /// The hosted application returned an error from its entry point.
    #[error("Application error: {0}")]
    Application(Box<dyn std::error::Error + Send + Sync>),
}

impl DaemonError {
    /// Builds a `Syscall` error from the calling thread's `errno`.
    pub(crate) fn last_syscall(call: &'static str) -> Self {
        DaemonError::Syscall {
            call,
            errno: io::Error::last_os_error().raw_os_error().unwrap_or(0),
        }
    }

    /// Process exit status a command-line front end should use for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Usage(err) => err.exit_code(),
            _ => 1,
        }
    }

    /// True for the "nothing is running" control errors.
    pub fn is_not_running(&self) -> bool {
        matches!(self, DaemonError::NotRunning(_) | DaemonError::NoPidFile)
    }
}

/// A specialized Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
