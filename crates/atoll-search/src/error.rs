//! Error types for the search engine.

use std::fmt;

use atoll::AtollError;
use atoll_expr::ExprError;

/// Errors that can occur while configuring or running a search.
#[derive(Debug)]
pub enum SearchError {
    /// A malformed config field.
    Parse { field: String, value: String },
    /// A config that cannot produce a valid run.
    Config(String),
    /// Log-file creation or other file-system failure. Fatal.
    Io(String),
    /// The generator's acceptance loop gave up; the alphabet/bounds
    /// combination is degenerate.
    Degenerate(String),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { field, value } => {
                write!(f, "config parse error: {field} = {value:?}")
            }
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::Io(msg) => write!(f, "io error: {msg}"),
            Self::Degenerate(msg) => write!(f, "degenerate search: {msg}"),
        }
    }
}

impl std::error::Error for SearchError {}

impl From<AtollError> for SearchError {
    fn from(e: AtollError) -> Self {
        match e {
            AtollError::Parse { field, value } => Self::Parse { field, value },
            AtollError::Io(msg) => Self::Io(msg),
            AtollError::Config(msg) => Self::Config(msg),
        }
    }
}

impl From<ExprError> for SearchError {
    fn from(e: ExprError) -> Self {
        match e {
            ExprError::Degenerate(msg) => Self::Degenerate(msg),
        }
    }
}

impl From<std::io::Error> for SearchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
