//! Publishers - the sending side of a topic
//!
//! A publisher never calls handlers inline. Each call is matched against the
//! topic's binding table, wrapped in a `Message` and handed to the bus, which
//! queues it per connection.

use std::fmt;
use std::marker::PhantomData;

use crate::bus::MessageBus;
use crate::error::BusResult;
use crate::message::Message;
use crate::topic::{MethodDescriptor, Topic, TopicMessage};

/// Fire-and-forget sender for topic `T`
pub struct Publisher<T: Topic> {
    bus: MessageBus,
    methods: &'static [MethodDescriptor],
    _topic: PhantomData<fn(T)>,
}

impl<T: Topic> Publisher<T> {
    pub(crate) fn new(bus: MessageBus) -> Self {
        // The bus-supplied table wins; it describes what is actually installed
        let methods = bus.bindings().methods(T::NAME).unwrap_or_else(T::methods);
        Self {
            bus,
            methods,
            _topic: PhantomData,
        }
    }

    /// Bus this publisher sends to
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Find the bound descriptor for a call
    pub fn resolve(&self, called: &MethodDescriptor) -> Option<MethodDescriptor> {
        self.methods.iter().find(|m| m.matches(called)).copied()
    }

    /// Publish one call
    ///
    /// A call with no matching binding is logged and dropped; it is not an
    /// error for the caller. Only bus disposal and handler cancellation are.
    pub fn publish(&self, message: T::Message) -> BusResult<()> {
        let called = message.descriptor();
        match self.resolve(&called) {
            Some(bound) => self
                .bus
                .send_message(Message::bind::<T>(message, bound), T::DIRECTION),
            None => {
                log::error!(
                    "Topic '{}' has no binding for {}; call dropped",
                    T::NAME,
                    called
                );
                self.bus.record_unbound_call();
                Ok(())
            }
        }
    }
}

impl<T: Topic> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            methods: self.methods,
            _topic: PhantomData,
        }
    }
}

impl<T: Topic> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &T::NAME)
            .field("bus", &self.bus.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;
    use crate::topic::TopicBindings;
    use parking_lot::Mutex;
    use std::sync::Arc;

    crate::declare_topic! {
        topic Build = "test.build";

        enum BuildEvent {
            Started { target: String },
            Finished { target: String, ok: bool },
        }
    }

    static STARTED_ONLY: &[MethodDescriptor] = &[MethodDescriptor::new("Started", &["String"])];

    #[test]
    fn test_unbound_method_is_dropped() {
        let mut bindings = TopicBindings::new();
        bindings.insert(Build::NAME, STARTED_ONLY);
        let bus = MessageBus::with_bindings(BusConfig::default(), bindings);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        bus.connect().subscribe_fn::<Build, _>(move |event| {
            s.lock().push(event.descriptor().name);
            Ok(())
        });

        let publisher = bus.publisher::<Build>();
        publisher
            .publish(BuildEvent::Started { target: "core".into() })
            .unwrap();
        publisher
            .publish(BuildEvent::Finished { target: "core".into(), ok: true })
            .unwrap();

        assert_eq!(*seen.lock(), vec!["Started"]);
        assert_eq!(bus.stats().unbound_calls, 1);
    }

    #[test]
    fn test_compiled_methods_used_without_bindings() {
        let bus = MessageBus::default();
        let publisher = bus.publisher::<Build>();
        let finished = BuildEvent::Finished { target: "x".into(), ok: false }.descriptor();
        assert_eq!(publisher.resolve(&finished), Some(finished));
    }
}
