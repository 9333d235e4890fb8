//! Error types for rendering and routing.
//!
//! [`FxError`] wraps every way a run can fail: data loading errors from
//! `jinjafx-data`, template failures from the engine, output tag problems and
//! exceptions raised by the template itself.

use jinjafx_data::DataError;
use thiserror::Error;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum FxError {
    /// A `</output>` without a matching start tag, or a start tag left open
    /// at the end of a row.
    #[error("unbalanced output tags")]
    UnbalancedOutputTags,

    /// An output destination rendered or declared with an empty name.
    #[error("invalid output name '{0}'")]
    InvalidOutputName(String),

    /// Raised by `jinjafx.exception()`; the message is the template's own.
    #[error("{0}")]
    Raised(String),

    /// Template syntax error or compilation failure.
    #[error("template error: {0}")]
    Template(String),

    /// Rendering failed for a row; `row` holds that row's bound variables.
    #[error("{message}")]
    Render {
        message: String,
        row: Option<serde_json::Value>,
    },

    /// Global variables could not be parsed.
    #[error("invalid vars: {0}")]
    Vars(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl FxError {
    /// Attaches the row's bound variables to a render error.
    pub fn with_row(self, bindings: serde_json::Value) -> Self {
        match self {
            FxError::Render { message, .. } => FxError::Render {
                message,
                row: Some(bindings),
            },
            other => other,
        }
    }

    /// The bound variables of the failing row, if known.
    pub fn row(&self) -> Option<&serde_json::Value> {
        match self {
            FxError::Render { row, .. } => row.as_ref(),
            _ => None,
        }
    }
}

impl From<minijinja::Error> for FxError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        match err.kind() {
            ErrorKind::SyntaxError
            | ErrorKind::BadEscape
            | ErrorKind::TemplateNotFound
            | ErrorKind::UnknownTest
            | ErrorKind::UnknownFilter
            | ErrorKind::UnknownFunction => FxError::Template(err.to_string()),
            _ => FxError::Render {
                message: err.to_string(),
                row: None,
            },
        }
    }
}

impl From<serde_json::Error> for FxError {
    fn from(err: serde_json::Error) -> Self {
        FxError::Vars(err.to_string())
    }
}

impl From<serde_yaml::Error> for FxError {
    fn from(err: serde_yaml::Error) -> Self {
        FxError::Vars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FxError>;
