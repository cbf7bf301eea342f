use std::fmt;
use std::str::FromStr;

/// Process identifier as recorded in a PID file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(i32);

impl Pid {
    /// Wraps a raw process id. Ids below 1 address process groups in
    /// `kill(2)` and are never valid PID file content.
    pub fn new(raw: i32) -> Option<Self> {
        if raw > 0 {
            Some(Pid(raw))
        } else {
            None
        }
    }

    /// The id of the calling process.
    pub fn current() -> Self {
        Pid(std::process::id() as i32)
    }

    pub fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when text does not hold a positive decimal process id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePidError;

impl fmt::Display for ParsePidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not a positive decimal process id")
    }
}

impl std::error::Error for ParsePidError {}

impl FromStr for Pid {
    type Err = ParsePidError;

    /// Surrounding whitespace (a trailing newline in particular) is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i32>()
            .ok()
            .and_then(Pid::new)
            .ok_or(ParsePidError)
    }
}
