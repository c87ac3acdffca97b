//! Message envelope and handler invocation
//!
//! A `Message` is built once per publication and shared by `Arc` between
//! every connection queue it is scheduled on. It carries a monomorphized
//! invoker, so delivery never needs to know the concrete topic type.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;

use parking_lot::RwLock;
use weft_core::catch_panic;

use crate::bus::BusStats;
use crate::error::{BusError, BusResult};
use crate::listener::{HandlerError, Handlers};
use crate::topic::{MethodDescriptor, Topic, TopicKey};

type Invoker = fn(&Message, &(dyn Any + Send + Sync), &RwLock<BusStats>) -> BusResult<()>;

/// An immutable published call: topic, method and arguments
pub struct Message {
    topic: TopicKey,
    method: MethodDescriptor,
    payload: Box<dyn Any + Send + Sync>,
    invoker: Invoker,
}

impl Message {
    /// Bind a payload to the resolved method of topic `T`
    pub(crate) fn bind<T: Topic>(payload: T::Message, method: MethodDescriptor) -> Self {
        Self {
            topic: TopicKey::of::<T>(),
            method,
            payload: Box::new(payload),
            invoker: invoke_topic::<T>,
        }
    }

    /// Topic this message was published on
    pub fn topic(&self) -> TopicKey {
        self.topic
    }

    /// Bound method descriptor
    pub fn method(&self) -> MethodDescriptor {
        self.method
    }

    /// Typed access to the arguments
    pub fn payload<T: Topic>(&self) -> Option<&T::Message> {
        self.payload.downcast_ref::<T::Message>()
    }

    /// Dispatch to the handlers a connection subscribed for this topic
    pub(crate) fn invoke(
        &self,
        handlers: &(dyn Any + Send + Sync),
        stats: &RwLock<BusStats>,
    ) -> BusResult<()> {
        (self.invoker)(self, handlers, stats)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("topic", &self.topic.name())
            .field("method", &self.method.to_string())
            .finish()
    }
}

fn invoke_topic<T: Topic>(
    message: &Message,
    handlers: &(dyn Any + Send + Sync),
    stats: &RwLock<BusStats>,
) -> BusResult<()> {
    let (Some(handlers), Some(payload)) = (
        handlers.downcast_ref::<Handlers<T>>(),
        message.payload::<T>(),
    ) else {
        log::error!("Type mismatch delivering {:?}", message);
        return Ok(());
    };

    for handler in handlers.iter() {
        let outcome = catch_panic(AssertUnwindSafe(|| handler.on_message(payload)));
        match outcome {
            Ok(Ok(())) => {
                stats.write().messages_delivered += 1;
            }
            Ok(Err(HandlerError::Unsupported(method))) => {
                log::debug!(
                    "Handler on '{}' predates method '{}'; skipped",
                    T::NAME,
                    method
                );
                stats.write().stale_handlers += 1;
            }
            Ok(Err(HandlerError::Cancelled)) => {
                log::debug!("Delivery of {:?} cancelled by handler", message);
                return Err(BusError::Cancelled);
            }
            Ok(Err(HandlerError::Failed(e))) => {
                log::error!("Handler failed on {}.{}: {}", T::NAME, message.method, e);
                stats.write().handler_faults += 1;
            }
            Err(panic) => {
                log::error!("Handler panicked on {}.{}: {}", T::NAME, message.method, panic);
                stats.write().handler_faults += 1;
            }
        }
    }

    Ok(())
}
