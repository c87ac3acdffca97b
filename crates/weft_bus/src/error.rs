//! Errors from the message bus

use thiserror::Error;

/// Errors surfaced to publishers and drainers
///
/// Handler faults never appear here; they are logged and counted. Only
/// cancellation escapes a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// A handler cancelled delivery; undelivered messages stay queued
    #[error("Message delivery cancelled")]
    Cancelled,

    /// The bus was disposed
    #[error("Message bus '{0}' is disposed")]
    Disposed(String),

    /// Configuration could not be parsed
    #[error("Invalid bus configuration: {0}")]
    Config(String),
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;
