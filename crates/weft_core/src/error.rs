//! Error types for the core library

use thiserror::Error;

/// The core error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The surrounding operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// The scope or object was already disposed
    #[error("Already disposed: {0}")]
    Disposed(String),

    /// A user callback panicked
    #[error("Callback panicked: {0}")]
    Panicked(String),
}

impl CoreError {
    /// Whether this error is a cancellation signal
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CoreError::Cancelled)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;
