use std::fmt;

pub(crate) type LucciolaResult<T> = Result<T, Error>;

/// Errors that can occur while building a grammar
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A regex failed to compile when adding a pattern to a grammar.
    /// Carries the offending pattern source so the caller can point at the
    /// grammar rule that produced it.
    #[allow(missing_docs)]
    RegexCompile { pattern: String, error: onig::Error },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RegexCompile { pattern, error } => {
                write!(f, "regex compilation failed: {error} in pattern {pattern:?}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::RegexCompile { error, .. } => Some(error),
        }
    }
}
