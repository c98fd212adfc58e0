//! Error types for atoll-expr.

use std::fmt;

/// Errors surfaced by expression generation.
#[derive(Debug)]
pub enum ExprError {
    /// The acceptance loop rejected too many candidates in a row; the
    /// alphabet/bounds combination cannot produce a valid individual.
    Degenerate(String),
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degenerate(msg) => write!(f, "degenerate generator: {msg}"),
        }
    }
}

impl std::error::Error for ExprError {}
