//! Error types for ctxmerge.

use thiserror::Error;

/// Why a context was canceled.
///
/// A context reports `None` from `err()` while active and one of these once
/// canceled. Causes are relayed unchanged from the source that fired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancelError {
    /// Canceled through a release function.
    #[error("context canceled")]
    Canceled,

    /// The context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Canceled through a release function with an explicit reason.
    #[error("context canceled: {0}")]
    Cause(String),
}

impl CancelError {
    /// Returns the explicit reason, if one was given.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Cause(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Errors raised while loading merge options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The strategy name is not recognized.
    #[error("unknown merge strategy '{0}', expected 'callback' or 'watcher'")]
    UnknownStrategy(String),

    /// The options document could not be parsed.
    #[error("invalid merge options: {0}")]
    InvalidOptions(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidOptions(err.to_string())
    }
}
