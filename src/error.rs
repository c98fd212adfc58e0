//! Error types shared across the atoll crates.

use std::fmt;

/// Errors surfaced by the foundation crate.
#[derive(Debug)]
pub enum AtollError {
    /// A malformed field in a data or config file.
    Parse { field: String, value: String },
    /// File-system failure (reading data, creating logs).
    Io(String),
    /// A configuration that cannot produce a valid run.
    Config(String),
}

impl fmt::Display for AtollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { field, value } => {
                write!(f, "parse error: {field} = {value:?}")
            }
            Self::Io(msg) => write!(f, "io error: {msg}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for AtollError {}

impl From<std::io::Error> for AtollError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
