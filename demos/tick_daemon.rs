//! A small ticker daemon.
//!
//! ```text
//! cargo run --example tick_daemon -- start
//! cargo run --example tick_daemon -- stop
//! ```
//!
//! Output goes to `ticker.log` / `ticker.err` in the current directory.
use daemon_runner::{Application, Runner};
use signal_hook::consts::signal::*;
use signal_hook::flag;
use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct Ticker {
    stdin: PathBuf,
    stdout: PathBuf,
    stderr: PathBuf,
    pidfile: PathBuf,
}

impl Application for Ticker {
    fn stdin_path(&self) -> &Path {
        &self.stdin
    }

    fn stdout_path(&self) -> &Path {
        &self.stdout
    }

    fn stderr_path(&self) -> &Path {
        &self.stderr
    }

    fn pidfile_path(&self) -> &Path {
        &self.pidfile
    }

    fn run(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        // Stop cleanly on SIGTERM (what `stop` sends) or SIGINT.
        let term = Arc::new(AtomicBool::new(false));
        flag::register(SIGTERM, Arc::clone(&term))?;
        flag::register(SIGINT, Arc::clone(&term))?;

        tracing::info!(pid = std::process::id(), "ticker running");

        let mut i = 0u64;
        while !term.load(Ordering::Relaxed) {
            // stdout already points at ticker.log
            println!("[Ticker] Ping #{}", i);
            i += 1;
            thread::sleep(Duration::from_secs(3));
        }

        tracing::info!("stop signal received, shutting down");
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        // stderr ends up in ticker.err, escape codes don't belong there
        .with_ansi(false)
        .init();

    let pwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let app = Ticker {
        stdin: PathBuf::from("/dev/null"),
        stdout: pwd.join("ticker.log"),
        stderr: pwd.join("ticker.err"),
        pidfile: pwd.join("ticker.pid"),
    };

    Runner::run_from_env(app)
}
