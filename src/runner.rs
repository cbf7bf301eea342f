//! Command-line controller: `start`, `stop` or `restart` a hosted
//! application as a daemon.

use std::error::Error;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use clap::{Parser, ValueEnum};

use crate::daemon::DaemonContext;
use crate::error::{DaemonError, DaemonResult};
use crate::stdio::Stdio;
use crate::sys::{System, UnixSystem};

/// The program a [`Runner`] turns into a daemon.
pub trait Application {
    /// File that replaces stdin, opened read-only.
    fn stdin_path(&self) -> &Path;
    /// File that receives stdout, created if needed and appended to.
    fn stdout_path(&self) -> &Path;
    /// File that receives stderr, created if needed and appended to.
    fn stderr_path(&self) -> &Path;
    fn pidfile_path(&self) -> &Path;

    /// Entry point, invoked exactly once in the daemonized process.
    fn run(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Requested lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Become a daemon and run the application.
    Start,
    /// Signal the running daemon to terminate.
    Stop,
    /// Stop, then start.
    Restart,
}

#[derive(Debug, Parser)]
#[command(about = "Control a background daemon")]
struct Cli {
    #[arg(value_enum)]
    action: Action,
}

impl Action {
    /// Parses the action out of a full argument vector (program name first).
    pub fn parse_from<I, T>(args: I) -> DaemonResult<Action>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Cli::try_parse_from(args)?.action)
    }
}

/// Controller for an application running in a separate background process.
pub struct Runner<A, S: System> {
    app: A,
    action: Action,
    context: DaemonContext<S>,
}

impl<A: Application> Runner<A, UnixSystem> {
    pub fn new<I, T>(app: A, args: I) -> DaemonResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::with_system(app, args, UnixSystem::new())
    }

    /// Parses `std::env::args`, performs the action and exits the process.
    ///
    /// Exits 0 on success (for `start`, once the application returns),
    /// 2 on a usage error and 1 on any other failure.
    pub fn run_from_env(app: A) -> ! {
        let result = Self::new(app, std::env::args_os()).and_then(|mut runner| runner.do_action());
        let code = match result {
            Ok(()) => 0,
            Err(DaemonError::Usage(err)) => {
                let _ = err.print();
                err.exit_code()
            }
            Err(err) => {
                let _ = writeln!(io::stderr(), "{}", err);
                err.exit_code()
            }
        };
        std::process::exit(code)
    }
}

impl<A: Application, S: System> Runner<A, S> {
    /// Parses the action and prepares a context for `app`.
    /// Nothing on disk is touched until the action is performed.
    pub fn with_system<I, T>(app: A, args: I, system: S) -> DaemonResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let action = Action::parse_from(args)?;
        let context = DaemonContext::with_system(system).pid_file(app.pidfile_path());
        Ok(Runner {
            app,
            action,
            context,
        })
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn context(&self) -> &DaemonContext<S> {
        &self.context
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    /// Performs the requested action.
    pub fn do_action(&mut self) -> DaemonResult<()> {
        tracing::debug!(action = ?self.action, "performing action");
        match self.action {
            Action::Start => self.start(),
            Action::Stop => self.stop(),
            Action::Restart => self.restart(),
        }
    }

    fn start(&mut self) -> DaemonResult<()> {
        // Refuse before the stream files get created.
        self.context.ensure_unlocked()?;
        self.bind_streams()?;
        self.context.start()?;
        self.app.run().map_err(DaemonError::Application)
    }

    fn stop(&mut self) -> DaemonResult<()> {
        self.context.stop()
    }

    /// Stop, then start. Starts anyway when nothing was running.
    fn restart(&mut self) -> DaemonResult<()> {
        match self.stop() {
            Ok(()) => {}
            Err(err) if err.is_not_running() => {
                tracing::warn!(error = %err, "nothing to stop, starting anyway");
            }
            Err(err) => return Err(err),
        }
        self.start()
    }

    fn bind_streams(&mut self) -> DaemonResult<()> {
        let stdin = File::open(self.app.stdin_path())?;
        let stdout = open_append(self.app.stdout_path())?;
        let stderr = open_append(self.app.stderr_path())?;

        self.context.stdin = Stdio::from(stdin);
        self.context.stdout = Stdio::from(stdout);
        self.context.stderr = Some(Stdio::from(stderr));
        Ok(())
    }
}

// Append rather than truncate so a restart keeps the previous run's output.
fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
