use std::fmt;

use tracing::warn;

use crate::error::Error;

/// A message shown to the operator after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice::Success(message.into())
    }

    /// Converts a failed action into a notice: the backend detail verbatim,
    /// a local validation message as is, anything else as `fallback`.
    pub fn from_error(err: &Error, fallback: &str) -> Self {
        warn!("{}", err);
        Notice::Error(err.user_message(fallback))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::Success(m) | Notice::Error(m) => m,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Success(m) => write!(f, "ok: {}", m),
            Notice::Error(m) => write!(f, "error: {}", m),
        }
    }
}
