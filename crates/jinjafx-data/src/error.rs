//! Error types for the data crate.

use thiserror::Error;

/// Errors raised while parsing, expanding, filtering or sorting input data.
#[derive(Debug, Error)]
pub enum DataError {
    /// A header column is empty.
    #[error("empty column header detected in data")]
    EmptyHeader,

    /// Two header columns share a name.
    #[error("duplicate column header '{0}' detected in data")]
    DuplicateHeader(String),

    /// A header column is not a valid field name or carries an unknown type.
    #[error("invalid column header '{0}' detected in data")]
    InvalidHeader(String),

    /// A header was found but no data rows survived.
    #[error("not enough data rows - need at least one row after the header")]
    NoData,

    /// A pattern uses a structural character that should have been escaped,
    /// or a numeric range is malformed.
    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    /// The sandboxed expansion budget was exhausted.
    #[error("pattern expansion exceeded the limit of {limit} variants")]
    Overflow { limit: usize },

    /// A typed column holds a value that can't be coerced.
    #[error("row {row}: invalid {kind} value '{value}' for field '{field}'")]
    InvalidValue {
        row: usize,
        field: String,
        kind: &'static str,
        value: String,
    },

    /// A filter references a column that isn't in the header.
    #[error("invalid filter field '{0}'")]
    UnknownFilterField(String),

    /// A filter regex doesn't compile.
    #[error("invalid filter regex '{pattern}' for field '{field}': {source}")]
    InvalidFilterRegex {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A sort key references a column that isn't in the header.
    #[error("invalid sort field '{0}'")]
    UnknownSortField(String),

    /// A field passed to a row query isn't in the header.
    #[error("invalid field '{0}'")]
    UnknownField(String),
}

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;
