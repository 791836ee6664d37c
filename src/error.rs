use std::io;
use std::result;

use stdcsv_core::Quotes;

/// A type alias for `Result<T, stdcsv::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when reading or writing delimited text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error, along with the path or operation that caused it.
    #[error("{context}: {err}")]
    Io {
        /// What was being done, usually including a path.
        context: String,
        /// The underlying error.
        #[source]
        err: io::Error,
    },
    /// A quoted field was still open when the input ended.
    #[error("line {line}: {quotes} qualifier issue")]
    QuoteViolation {
        /// The 1-based line on which the record started.
        line: u64,
        /// The quoting convention in effect.
        quotes: Quotes,
    },
    /// A quoted field spanned more lines than allowed.
    #[error(
        "line {line}: {quotes} qualifier issue \
         (more than {limit} continuation lines)"
    )]
    ContinuationLimitExceeded {
        /// The 1-based line on which the record started.
        line: u64,
        /// The quoting convention in effect.
        quotes: Quotes,
        /// The configured maximum number of continuation lines.
        limit: usize,
    },
    /// An operation that isn't supported by a particular reader or writer.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

impl Error {
    /// Wrap an I/O error with what was being attempted.
    pub(crate) fn io<C: Into<String>>(context: C, err: io::Error) -> Error {
        Error::Io { context: context.into(), err }
    }

    /// Returns true if this error means the input broke the quoting rules.
    pub fn is_violation(&self) -> bool {
        match *self {
            Error::QuoteViolation { .. }
            | Error::ContinuationLimitExceeded { .. } => true,
            _ => false,
        }
    }
}

/// Extension for attaching context to I/O results.
pub(crate) trait IoResultExt<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T>;

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|err| Error::io(context, err))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|err| Error::io(f(), err))
    }
}
