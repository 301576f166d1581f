/*!
 * Error types for twinsweep
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, DedupError>;

#[derive(Debug)]
pub enum DedupError {
    /// Bad flag or flag combination supplied on the command line
    Config(String),

    /// stat/open/read failed for a single candidate file; the caller skips
    /// the file and continues
    Io { path: PathBuf, source: io::Error },

    /// Signature cache open/load/save failed
    Cache(String),

    /// Out-of-resource or other condition that must abort the run
    Fatal(String),

    /// User interrupt (Ctrl-C) observed by a cooperative poll
    Cancelled,
}

impl DedupError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DedupError::Io {
            path: path.into(),
            source,
        }
    }

    /// Configuration and fatal errors should abort the process with exit 1.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DedupError::Config(_) | DedupError::Fatal(_))
    }

    /// Cancellation is a clean, successful exit.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DedupError::Cancelled)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DedupError::Config(_) => ErrorCategory::Configuration,
            DedupError::Io { .. } => ErrorCategory::IoTransient,
            DedupError::Cache(_) => ErrorCategory::Cache,
            DedupError::Fatal(_) => ErrorCategory::Fatal,
            DedupError::Cancelled => ErrorCategory::Cancellation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    IoTransient,
    Cache,
    Fatal,
    Cancellation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::IoTransient => write!(f, "io"),
            ErrorCategory::Cache => write!(f, "cache"),
            ErrorCategory::Fatal => write!(f, "fatal"),
            ErrorCategory::Cancellation => write!(f, "cancellation"),
        }
    }
}

impl fmt::Display for DedupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupError::Config(msg) => write!(f, "configuration error: {}", msg),
            DedupError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            DedupError::Cache(msg) => write!(f, "cache error: {}", msg),
            DedupError::Fatal(msg) => write!(f, "fatal error: {}", msg),
            DedupError::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for DedupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DedupError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DedupError {
    fn from(err: rusqlite::Error) -> Self {
        DedupError::Cache(err.to_string())
    }
}
