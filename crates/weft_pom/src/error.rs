//! Errors from the aspect model

use thiserror::Error;
use weft_core::CoreError;

use crate::aspect::AspectId;

/// Errors surfaced by `PomModel`
#[derive(Debug, Error)]
pub enum ModelError {
    /// A transaction was started while modifications are guarded
    #[error("Model modification is not allowed inside a guarded block")]
    ModificationNotAllowed,

    /// Programming error: the operation is not legal in this context
    #[error("Incorrect operation: {0}")]
    IncorrectOperation(String),

    /// The model or a collaborator is in a state that forbids the operation
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The aspect id was registered before
    #[error("Aspect '{0}' is already registered")]
    AlreadyRegistered(AspectId),

    /// Cancellation; never collected, always propagated
    #[error("Transaction cancelled")]
    Cancelled,

    /// A transaction body failed
    #[error("Transaction failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A body, aspect update or listener panicked
    #[error("Panic during transaction: {0}")]
    Panicked(String),

    /// Several failures collected over one transaction
    #[error("{} failures during transaction", .0.len())]
    Compound(Vec<ModelError>),

    /// Configuration could not be parsed
    #[error("Invalid model configuration: {0}")]
    Config(String),
}

impl ModelError {
    /// Wrap any error or message as a body failure
    pub fn failed(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ModelError::Failed(error.into())
    }

    /// Whether this is a cancellation signal
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ModelError::Cancelled)
    }

    /// Failures contained in this error, flattening `Compound`
    pub fn failures(&self) -> Vec<&ModelError> {
        match self {
            ModelError::Compound(all) => all.iter().flat_map(ModelError::failures).collect(),
            other => vec![other],
        }
    }
}

impl From<CoreError> for ModelError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Cancelled => ModelError::Cancelled,
            CoreError::Panicked(msg) => ModelError::Panicked(msg),
            CoreError::Disposed(name) => ModelError::IllegalState(format!("'{}' is disposed", name)),
        }
    }
}

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_flattens() {
        let err = ModelError::Compound(vec![
            ModelError::Panicked("a".into()),
            ModelError::Compound(vec![ModelError::failed("b"), ModelError::Panicked("c".into())]),
        ]);
        assert_eq!(err.failures().len(), 3);
        assert_eq!(err.to_string(), "2 failures during transaction");
    }

    #[test]
    fn test_core_cancellation_is_recognised() {
        let err: ModelError = CoreError::Cancelled.into();
        assert!(err.is_cancellation());
        let err: ModelError = CoreError::Disposed("scope".into()).into();
        assert!(!err.is_cancellation());
    }
}
