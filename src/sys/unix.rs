use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::process::exit;

#[cfg(target_os = "linux")]
use sd_notify::NotifyState;

use crate::error::{DaemonError, DaemonResult};
use crate::stdio::Stdio;
use crate::sys::{StdStream, System};
use crate::types::Pid;

/// The real platform: `libc` calls against the running process.
#[derive(Debug, Clone, Default)]
pub struct UnixSystem {
    supervised: bool,
}

impl UnixSystem {
    /// Detects whether a service manager supervises this process
    /// (Systemd exports `NOTIFY_SOCKET` for `Type=notify` units).
    pub fn new() -> Self {
        UnixSystem {
            supervised: cfg!(target_os = "linux") && std::env::var_os("NOTIFY_SOCKET").is_some(),
        }
    }
}

impl System for UnixSystem {
    fn is_supervised(&self) -> bool {
        self.supervised
    }

    fn detach(&mut self) -> DaemonResult<()> {
        detach_process_context();
        Ok(())
    }

    fn change_directory(&mut self, path: &Path) -> DaemonResult<()> {
        std::env::set_current_dir(path).map_err(|source| DaemonError::Chdir {
            path: path.to_path_buf(),
            source,
        })
    }

    fn set_umask(&mut self, mask: u32) {
        unsafe {
            libc::umask(mask as libc::mode_t);
        }
    }

    fn suppress_core_dumps(&mut self) -> DaemonResult<()> {
        prevent_core_dump()
    }

    fn redirect(&mut self, stream: StdStream, target: &Stdio) -> DaemonResult<()> {
        redirect_stream(stream, target)
    }

    fn current_pid(&self) -> Pid {
        Pid::current()
    }

    fn send_signal(&mut self, pid: Pid, signal: i32) -> DaemonResult<()> {
        if unsafe { libc::kill(pid.as_raw(), signal) } < 0 {
            return Err(DaemonError::Signal {
                pid,
                signal,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    fn notify_ready(&mut self) -> DaemonResult<()> {
        #[cfg(target_os = "linux")]
        {
            if self.supervised {
                // 'true' unsets NOTIFY_SOCKET so it doesn't leak to children.
                sd_notify::notify(true, &[NotifyState::Ready])?;
            }
        }
        Ok(())
    }
}

/// Detaches the process from its parent and session.
///
/// Fork, `setsid`, fork again. Each parent exits with status 0 right away;
/// only the grandchild returns. It is not a session leader, so it can never
/// reacquire a controlling terminal. A failed fork is fatal: the reason is
/// written to stderr and the process exits with status 1.
pub fn detach_process_context() {
    fork_and_exit_parent("fork #1");

    if unsafe { libc::setsid() } < 0 {
        fatal(DaemonError::last_syscall("setsid"));
    }

    fork_and_exit_parent("fork #2");
}

fn fork_and_exit_parent(step: &str) {
    match unsafe { libc::fork() } {
        pid if pid < 0 => {
            let err = io::Error::last_os_error();
            let _ = writeln!(
                io::stderr(),
                "{} failed: ({}) {}",
                step,
                err.raw_os_error().unwrap_or(0),
                err
            );
            exit(1);
        }
        0 => {}
        _ => exit(0),
    }
}

fn fatal(err: DaemonError) -> ! {
    let _ = writeln!(io::stderr(), "{}", err);
    exit(1);
}

/// Sets the soft and hard core dump size limits to zero.
///
/// The current limit is queried first so a platform without `RLIMIT_CORE`
/// fails here instead of silently keeping core dumps on.
pub fn prevent_core_dump() -> DaemonResult<()> {
    let mut previous = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::getrlimit(libc::RLIMIT_CORE, &mut previous) } < 0 {
        return Err(DaemonError::last_syscall("getrlimit"));
    }
    tracing::debug!(
        soft = previous.rlim_cur as u64,
        hard = previous.rlim_max as u64,
        "disabling core dumps"
    );

    let none = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::setrlimit(libc::RLIMIT_CORE, &none) } < 0 {
        return Err(DaemonError::last_syscall("setrlimit"));
    }
    Ok(())
}

/// Duplicates the target's descriptor onto the standard stream's descriptor.
pub fn redirect_stream(stream: StdStream, target: &Stdio) -> DaemonResult<()> {
    match target {
        Stdio::File(f) => dup_onto(f.as_raw_fd(), stream.fd()),
        Stdio::Devnull => {
            let devnull = OpenOptions::new()
                .read(true)
                .write(true)
                .open("/dev/null")?;
            // The duplicate outlives `devnull`, which closes on drop.
            dup_onto(devnull.as_raw_fd(), stream.fd())
        }
        Stdio::Keep => Ok(()),
    }
}

fn dup_onto(src: libc::c_int, dst: libc::c_int) -> DaemonResult<()> {
    if unsafe { libc::dup2(src, dst) } < 0 {
        return Err(DaemonError::last_syscall("dup2"));
    }
    Ok(())
}
