use std::fs::File;
use std::sync::Arc;

/// Replacement target for one of the standard streams (stdin, stdout, stderr).
#[derive(Debug, Clone)]
pub enum Stdio {
    /// Redirects the stream to `/dev/null`. Default option.
    Devnull,
    /// Redirects the stream to an already open file.
    ///
    /// The handle is shared so one open file can back more than one stream.
    File(Arc<File>),
    /// Keeps the original stream (useful for debugging, but not recommended for production).
    Keep,
}

impl Stdio {
    /// Creates a configuration that discards all output.
    pub fn devnull() -> Self {
        Stdio::Devnull
    }

    /// True when both values designate the same target: the very same open
    /// file for `File`, the same variant otherwise.
    pub fn same_target(&self, other: &Stdio) -> bool {
        match (self, other) {
            (Stdio::File(a), Stdio::File(b)) => Arc::ptr_eq(a, b),
            (Stdio::Devnull, Stdio::Devnull) | (Stdio::Keep, Stdio::Keep) => true,
            _ => false,
        }
    }
}

impl Default for Stdio {
    fn default() -> Self {
        Stdio::Devnull
    }
}

impl From<File> for Stdio {
    fn from(f: File) -> Self {
        Stdio::File(Arc::new(f))
    }
}

impl From<Arc<File>> for Stdio {
    fn from(f: Arc<File>) -> Self {
        Stdio::File(f)
    }
}
