//! # daemon_runner
//!
//! Turns a long-running routine into a well-behaved Unix daemon: it detaches
//! from the controlling terminal and the launching session, disables core
//! dumps, redirects the standard streams to files of the caller's choosing
//! and records itself in a PID file.
//!
//! The PID file doubles as the control channel. A second `start` sees it and
//! refuses to run, `stop` reads the owner's id from it and signals that process.
//! [`Runner`] wires this to a `start|stop|restart` command line.
//!

#[cfg(not(unix))]
compile_error!("daemon_runner only supports Unix platforms");

mod daemon;
mod error;
mod pidfile;
mod runner;
mod stdio;
mod sys;
mod types;

// Re-export public types to keep the API flat
pub use daemon::{ContextState, DaemonContext};
pub use error::{DaemonError, DaemonResult};
pub use pidfile::PidLockFile;
pub use runner::{Action, Application, Runner};
pub use stdio::Stdio;
pub use sys::unix::{detach_process_context, prevent_core_dump, redirect_stream};
pub use sys::{StdStream, System, UnixSystem};
pub use types::{ParsePidError, Pid};
