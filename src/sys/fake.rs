//! Recording stand-in for [`System`]: nothing forks, nothing is redirected,
//! every call is appended to a shared log the test keeps a handle on.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{DaemonError, DaemonResult};
use crate::stdio::Stdio;
use crate::sys::{StdStream, System};
use crate::types::Pid;

#[derive(Debug, Clone)]
pub(crate) enum Call {
    Detach,
    ChangeDirectory(PathBuf),
    SetUmask(u32),
    SuppressCoreDumps,
    Announce(String),
    /// Whether the watched PID file existed when a redirect was requested.
    PidFilePresent(bool),
    Redirect(StdStream, Stdio),
    Signal(Pid, i32),
    NotifyReady,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeSystem {
    pub(crate) calls: Rc<RefCell<Vec<Call>>>,
    pub(crate) pid: Pid,
    pub(crate) supervised: bool,
    pub(crate) fail_detach: bool,
    pub(crate) fail_signal: bool,
    pub(crate) watch: Option<PathBuf>,
}

impl FakeSystem {
    pub(crate) fn new(pid: i32) -> Self {
        FakeSystem {
            calls: Rc::new(RefCell::new(Vec::new())),
            pid: Pid::new(pid).unwrap(),
            supervised: false,
            fail_detach: false,
            fail_signal: false,
            watch: None,
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub(crate) fn detached(&self) -> bool {
        self.calls.borrow().iter().any(|c| matches!(c, Call::Detach))
    }

    pub(crate) fn signals(&self) -> Vec<(Pid, i32)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Signal(pid, sig) => Some((*pid, *sig)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn redirected(&self, stream: StdStream) -> Option<Stdio> {
        self.calls.borrow().iter().rev().find_map(|c| match c {
            Call::Redirect(s, target) if *s == stream => Some(target.clone()),
            _ => None,
        })
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl System for FakeSystem {
    fn is_supervised(&self) -> bool {
        self.supervised
    }

    fn detach(&mut self) -> DaemonResult<()> {
        if self.fail_detach {
            return Err(DaemonError::Syscall {
                call: "fork",
                errno: libc::EAGAIN,
            });
        }
        self.record(Call::Detach);
        Ok(())
    }

    fn change_directory(&mut self, path: &Path) -> DaemonResult<()> {
        self.record(Call::ChangeDirectory(path.to_path_buf()));
        Ok(())
    }

    fn set_umask(&mut self, mask: u32) {
        self.record(Call::SetUmask(mask));
    }

    fn suppress_core_dumps(&mut self) -> DaemonResult<()> {
        self.record(Call::SuppressCoreDumps);
        Ok(())
    }

    fn announce(&mut self, msg: &str) -> DaemonResult<()> {
        self.record(Call::Announce(msg.to_owned()));
        Ok(())
    }

    fn redirect(&mut self, stream: StdStream, target: &Stdio) -> DaemonResult<()> {
        if let Some(path) = &self.watch {
            self.record(Call::PidFilePresent(path.exists()));
        }
        self.record(Call::Redirect(stream, target.clone()));
        Ok(())
    }

    fn current_pid(&self) -> Pid {
        self.pid
    }

    fn send_signal(&mut self, pid: Pid, signal: i32) -> DaemonResult<()> {
        if self.fail_signal {
            return Err(DaemonError::Signal {
                pid,
                signal,
                source: std::io::Error::from_raw_os_error(libc::ESRCH),
            });
        }
        self.record(Call::Signal(pid, signal));
        Ok(())
    }

    fn notify_ready(&mut self) -> DaemonResult<()> {
        if self.supervised {
            self.record(Call::NotifyReady);
        }
        Ok(())
    }
}
