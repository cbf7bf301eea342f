//! Platform layer. Every OS interaction the daemon lifecycle needs goes
//! through [`System`], so the sequencing in `DaemonContext` can be driven
//! against a recording double in tests.

use std::io::{self, Write};
use std::path::Path;

use crate::error::DaemonResult;
use crate::stdio::Stdio;
use crate::types::Pid;

pub(crate) mod unix;

#[cfg(test)]
pub(crate) mod fake;

pub use unix::UnixSystem;

/// Which standard stream a redirection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Input,
    Output,
    Error,
}

impl StdStream {
    /// The conventional descriptor number of the stream.
    pub fn fd(self) -> i32 {
        match self {
            StdStream::Input => 0,
            StdStream::Output => 1,
            StdStream::Error => 2,
        }
    }
}

/// OS primitives used to become and control a daemon.
pub trait System {
    /// True when a service manager supervises this process, in which case
    /// start-up stays in the foreground and reports readiness instead.
    fn is_supervised(&self) -> bool {
        false
    }

    /// Double fork with a session detach in between. Returns only in the
    /// surviving grandchild; both intermediate parents exit with status 0.
    fn detach(&mut self) -> DaemonResult<()>;

    fn change_directory(&mut self, path: &Path) -> DaemonResult<()>;

    fn set_umask(&mut self, mask: u32);

    /// Sets soft and hard core-dump size limits to zero.
    fn suppress_core_dumps(&mut self) -> DaemonResult<()>;

    /// Makes `stream` refer to `target` from now on.
    fn redirect(&mut self, stream: StdStream, target: &Stdio) -> DaemonResult<()>;

    /// Writes a one-line notice to stderr and flushes it. Called right
    /// before redirection, so it is the last thing the launching terminal sees.
    fn announce(&mut self, msg: &str) -> DaemonResult<()> {
        let mut err = io::stderr().lock();
        writeln!(err, "\n{}", msg)?;
        err.flush()?;
        Ok(())
    }

    fn current_pid(&self) -> Pid;

    fn send_signal(&mut self, pid: Pid, signal: i32) -> DaemonResult<()>;

    /// Tells a supervising service manager that start-up completed.
    /// No-op when the process is not supervised.
    fn notify_ready(&mut self) -> DaemonResult<()> {
        Ok(())
    }
}
