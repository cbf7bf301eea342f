use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{DaemonError, DaemonResult};
use crate::types::Pid;

/// Ownership of a PID file.
///
/// "Locked" means the file exists, whoever created it. An instance that
/// acquired the file additionally holds an exclusive `flock` on it until it
/// is released or the process exits, and creation is exclusive, so two
/// processes racing past `is_locked` cannot both acquire.
#[derive(Debug)]
pub struct PidLockFile {
    path: PathBuf,
    held: Option<File>,
}

impl PidLockFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        PidLockFile {
            path: path.into(),
            held: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True iff the file exists. Never cached.
    pub fn is_locked(&self) -> bool {
        self.path.exists()
    }

    /// True if this value created the file and still holds its lock.
    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Reads the owner's process id from the file.
    pub fn read_pid(&self) -> DaemonResult<Pid> {
        let content = fs::read_to_string(&self.path)?;
        content.parse().map_err(|_| DaemonError::InvalidPid {
            path: self.path.clone(),
            content,
        })
    }

    /// Acquires the file on behalf of the calling process.
    pub fn acquire(&mut self) -> DaemonResult<()> {
        self.acquire_for(Pid::current())
    }

    /// Creates the file, locks it and writes `pid` as decimal text.
    pub fn acquire_for(&mut self, pid: Pid) -> DaemonResult<()> {
        if self.held.is_some() {
            return Err(DaemonError::AlreadyLocked(self.path.clone()));
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => DaemonError::AlreadyLocked(self.path.clone()),
                _ => DaemonError::Io(e),
            })?;

        if let Err(err) = lock_and_write(&file, pid) {
            let _ = fs::remove_file(&self.path);
            return Err(err);
        }

        tracing::debug!(pid = %pid, path = %self.path.display(), "acquired PID file");
        self.held = Some(file);
        Ok(())
    }

    /// True if the file exists but no open handle holds its `flock`, i.e.
    /// the owner exited without releasing, or the file was not written by
    /// `acquire`. Absent files are not stale.
    pub fn is_stale(&self) -> bool {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return false,
        };
        let fd = file.as_raw_fd();
        if unsafe { libc::flock(fd, libc::LOCK_SH | libc::LOCK_NB) } < 0 {
            return false;
        }
        unsafe { libc::flock(fd, libc::LOCK_UN) };
        true
    }

    /// Drops the held lock, if any, and removes the file.
    ///
    /// Removing an absent file is an error; check `is_locked` first.
    pub fn release(&mut self) -> DaemonResult<()> {
        self.held.take();
        fs::remove_file(&self.path)?;
        tracing::debug!(path = %self.path.display(), "released PID file");
        Ok(())
    }
}

fn lock_and_write(file: &File, pid: Pid) -> DaemonResult<()> {
    // Held until the owning handle closes, which `is_stale` relies on.
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } < 0 {
        return Err(DaemonError::Io(io::Error::last_os_error()));
    }
    let mut file = file;
    writeln!(file, "{}", pid)?;
    file.flush()?;
    Ok(())
}
