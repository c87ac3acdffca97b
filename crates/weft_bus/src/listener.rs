//! Topic listeners and handler outcomes

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;
use weft_core::CoreError;

use crate::topic::Topic;

/// Why a handler did not complete normally
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler predates this topic method; swallowed by the bus
    #[error("Handler does not implement '{0}'")]
    Unsupported(&'static str),

    /// Abort delivery; propagates to whoever is draining the queue
    #[error("Handler cancelled delivery")]
    Cancelled,

    /// Ordinary failure; logged, remaining handlers still run
    #[error("Handler failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap any error or message as a handler failure
    pub fn failed(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        HandlerError::Failed(error.into())
    }
}

impl From<CoreError> for HandlerError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Cancelled => HandlerError::Cancelled,
            other => HandlerError::Failed(Box::new(other)),
        }
    }
}

/// Result of handling one message
pub type HandlerResult = Result<(), HandlerError>;

/// Receives messages published on topic `T`
pub trait TopicListener<T: Topic>: Send + Sync + 'static {
    /// Handle one message
    fn on_message(&self, message: &T::Message) -> HandlerResult;
}

/// Adapter turning a closure into a `TopicListener`
pub struct FnListener<T, F> {
    f: F,
    _topic: PhantomData<fn() -> T>,
}

impl<T, F> FnListener<T, F>
where
    T: Topic,
    F: Fn(&T::Message) -> HandlerResult + Send + Sync + 'static,
{
    /// Wrap a closure
    pub fn new(f: F) -> Self {
        Self {
            f,
            _topic: PhantomData,
        }
    }
}

impl<T, F> TopicListener<T> for FnListener<T, F>
where
    T: Topic,
    F: Fn(&T::Message) -> HandlerResult + Send + Sync + 'static,
{
    fn on_message(&self, message: &T::Message) -> HandlerResult {
        (self.f)(message)
    }
}

/// Handlers subscribed to one topic on one connection
///
/// The common case of a single handler avoids the vector entirely.
pub(crate) enum Handlers<T: Topic> {
    Single(Arc<dyn TopicListener<T>>),
    Many(Vec<Arc<dyn TopicListener<T>>>),
}

impl<T: Topic> Handlers<T> {
    /// New handler set with `listener` appended
    pub(crate) fn with(&self, listener: Arc<dyn TopicListener<T>>) -> Self {
        match self {
            Handlers::Single(existing) => Handlers::Many(vec![existing.clone(), listener]),
            Handlers::Many(existing) => {
                let mut all = existing.clone();
                all.push(listener);
                Handlers::Many(all)
            }
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<dyn TopicListener<T>>> {
        let (single, many) = match self {
            Handlers::Single(one) => (Some(one), &[][..]),
            Handlers::Many(all) => (None, all.as_slice()),
        };
        single.into_iter().chain(many.iter())
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Handlers::Single(_) => 1,
            Handlers::Many(all) => all.len(),
        }
    }
}

impl<T: Topic> Clone for Handlers<T> {
    fn clone(&self) -> Self {
        match self {
            Handlers::Single(one) => Handlers::Single(one.clone()),
            Handlers::Many(all) => Handlers::Many(all.clone()),
        }
    }
}

impl<T: Topic> fmt::Debug for Handlers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handlers({}, {})", T::NAME, self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::declare_topic! {
        topic Pings = "test.pings";

        enum Ping {
            Hit { n: u32 },
        }
    }

    fn noop() -> Arc<dyn TopicListener<Pings>> {
        Arc::new(FnListener::<Pings, _>::new(|_: &Ping| Ok(())))
    }

    #[test]
    fn test_handlers_accumulate_in_order() {
        let first = noop();
        let second = noop();
        let handlers = Handlers::Single(first.clone()).with(second.clone());

        assert_eq!(handlers.len(), 2);
        let collected: Vec<_> = handlers.iter().collect();
        assert!(Arc::ptr_eq(collected[0], &first));
        assert!(Arc::ptr_eq(collected[1], &second));
    }

    #[test]
    fn test_with_leaves_original_untouched() {
        let original = Handlers::Single(noop());
        let grown = original.with(noop()).with(noop());
        assert_eq!(original.len(), 1);
        assert_eq!(grown.len(), 3);
    }

    #[test]
    fn test_core_cancellation_maps_to_cancelled() {
        let err: HandlerError = CoreError::Cancelled.into();
        assert!(matches!(err, HandlerError::Cancelled));

        let err: HandlerError = CoreError::Disposed("x".into()).into();
        assert!(matches!(err, HandlerError::Failed(_)));
    }
}
