// Error taxonomy for the scan pipeline.
// Template and boundary errors are fatal before any line is read; decode errors
// are recovered per line by the reader; scan errors end the stream.

use thiserror::Error;

/// The line template could not be compiled
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("log format contains no %(...)s placeholders")]
    NoPlaceholders,

    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),

    #[error("placeholder at byte {0} must end with \")s\"")]
    MissingConversion(usize),

    #[error("empty placeholder name at byte {0}")]
    EmptyName(usize),

    #[error("malformed bracket expression {directive:?} at byte {offset}")]
    MalformedBracket { offset: usize, directive: String },

    #[error("unknown origin tag {tag:?} after {{{name}}} (expected i, o or e)")]
    UnknownOrigin { name: String, tag: String },

    #[error("invalid field name {0:?} (only letters, digits and '_' are allowed)")]
    InvalidName(String),

    #[error("field {0:?} appears more than once in the log format")]
    DuplicateField(String),

    #[error("failed to build line matcher: {0}")]
    Regex(#[from] Box<regex_automata::meta::BuildError>),
}

/// A single line could not be turned into a `LogRecord`
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line does not match the log format")]
    NoMatch,

    #[error("line is not valid UTF-8")]
    NonUtf8,

    #[error("log format does not capture required field {0:?}")]
    MissingField(&'static str),

    #[error("field {field:?} is not an integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// A user-supplied time bound or ordering value was rejected
#[derive(Debug, Error)]
pub enum BoundError {
    #[error("invalid date {0:?} (expected DD/MM/YYYY:HH:MM:SS+HHMM or DD/MM/YYYY:HH:MM:SS)")]
    InvalidTimestamp(String),

    #[error("invalid order {0:?}, should be either 'ascending' or 'descending'")]
    InvalidOrder(String),
}

/// Terminal conditions of a scan
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid log format: {0}")]
    Format(#[from] FormatError),

    #[error("failed to read log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("scan cancelled")]
    Cancelled,
}
