use std::fmt;
use std::io;

/// The top-level error type for the core.
///
/// All three kinds are fatal; `BoundaryWarning`, the one other
/// diagnostic this binary reports, is non-fatal by definition and is
/// reported through the `boundary_warning!` logging macro instead of
/// this type.
#[derive(Debug)]
pub enum CoreError {
    /// An impossible configuration: conflicting options, a buffer smaller
    /// than the pattern's minimum match length, a `Replace` op without
    /// match or sed mode, or a sort/unique comparator clash in
    /// bounded-memory mode.
    Config(String),
    /// A regex compile or match-time failure, including `\K` misuse and
    /// strict-mode UTF decoding errors.
    Regex(morsel_pcre2::Error),
    /// A read or write failure on the input or output stream.
    Io(io::Error),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Config(msg) => write!(f, "{}", msg),
            CoreError::Regex(err) => write!(f, "{}", err),
            CoreError::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Config(_) => None,
            CoreError::Regex(err) => Some(err),
            CoreError::Io(err) => Some(err),
        }
    }
}

impl From<morsel_pcre2::Error> for CoreError {
    fn from(err: morsel_pcre2::Error) -> CoreError {
        CoreError::Regex(err)
    }
}

impl From<io::Error> for CoreError {
    fn from(err: io::Error) -> CoreError {
        CoreError::Io(err)
    }
}

/// The result type used throughout the core.
pub type Result<T> = std::result::Result<T, CoreError>;
