use std::fmt;
use thiserror::Error;

/// Diagnostics produced while turning a query string into an AST.
///
/// None of these abort a parse: the parser records them and keeps going, so a
/// partially malformed query still yields the best-effort tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Unmatched parenthesis: {0}")]
    UnmatchedParen(ParenImbalance),

    #[error("Invalid number for '{field}': '{value}'")]
    InvalidNumeric { field: String, value: String },

    #[error("Invalid filter '{atom}': {reason}")]
    InvalidAtom { atom: String, reason: String },

    #[error("Unexpected '{token}' at token {position}")]
    UnexpectedToken { token: String, position: usize },
}

/// Which side of a parenthesis pair is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParenImbalance {
    /// A `)` at byte `position` closes nothing.
    MissingOpen { position: usize },
    /// Input ended with `count` groups still open.
    MissingClose { count: usize },
}

impl fmt::Display for ParenImbalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParenImbalance::MissingOpen { position } => {
                write!(f, "')' at byte {position} has no matching '('")
            }
            ParenImbalance::MissingClose { count: 1 } => write!(f, "missing 1 closing ')'"),
            ParenImbalance::MissingClose { count } => write!(f, "missing {count} closing ')'"),
        }
    }
}

/// Coarse classification of a [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnmatchedParen,
    InvalidNumeric,
    InvalidAtom,
    UnexpectedToken,
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::UnmatchedParen(_) => ErrorKind::UnmatchedParen,
            QueryError::InvalidNumeric { .. } => ErrorKind::InvalidNumeric,
            QueryError::InvalidAtom { .. } => ErrorKind::InvalidAtom,
            QueryError::UnexpectedToken { .. } => ErrorKind::UnexpectedToken,
        }
    }

    pub(crate) fn invalid_atom(atom: &str, reason: impl Into<String>) -> Self {
        QueryError::InvalidAtom {
            atom: atom.to_string(),
            reason: reason.into(),
        }
    }
}
