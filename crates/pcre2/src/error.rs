use std::error;
use std::fmt;

/// An error produced by the regex adapter.
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Error { kind }
    }

    pub(crate) fn regex<E: error::Error>(err: E) -> Error {
        Error { kind: ErrorKind::Regex(err.to_string()) }
    }

    /// The kind of error that occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

/// The distinct kinds of error the regex adapter can report: compile
/// failure, runtime matching failure, `\K` misuse, and UTF-decoding
/// failure under strict mode all surface through this type.
#[derive(Clone, Debug)]
pub enum ErrorKind {
    /// The pattern failed to compile: a syntax error, or an attempt to
    /// compile a pattern too large for the engine's internal limits.
    Regex(String),
    /// A match attempt failed for a reason other than "no match" or
    /// "partial match" — e.g. a match-time resource limit, or invalid UTF-8
    /// input rejected under strict UTF checking.
    Match(String),
    /// PCRE2 reported a match whose start follows its end, which happens
    /// only when `\K` resets the match start to a point after the true
    /// match end. Treated as a hard error rather than silently producing
    /// a backwards range.
    KBeforeMatchEnd,
    /// Pattern introspection (`PCRE2_INFO_MAXLOOKBEHIND`,
    /// `PCRE2_INFO_MINLENGTH`) failed. This should not happen for a
    /// pattern that compiled successfully; treated as fatal rather than
    /// silently assuming a default.
    Introspection(String),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Regex(ref s) => write!(f, "{}", s),
            ErrorKind::Match(ref s) => write!(f, "{}", s),
            ErrorKind::KBeforeMatchEnd => write!(
                f,
                "\\K set the match start after the match end; \
                 this pattern cannot be used here"
            ),
            ErrorKind::Introspection(ref s) => write!(f, "{}", s),
        }
    }
}
