//! Message bus - hierarchical publish/subscribe hub
//!
//! Buses form a tree (application -> project -> module, say). Publishing
//! on a bus schedules the message on every live connection subscribed to the
//! topic within the topic's broadcast reach, then (in immediate mode) drains
//! the publishing thread's delivery queue.
//!
//! The root owns state shared by the whole tree: configuration, topic
//! bindings, the per-topic subscriber cache and the per-thread job queues.

use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use weft_core::{Disposable, DisposalScope, Id, IdGenerator};

use crate::config::{BusConfig, DeliveryMode};
use crate::connection::{Connection, ConnectionInner};
use crate::error::{BusError, BusResult};
use crate::message::Message;
use crate::publisher::Publisher;
use crate::topic::{BroadcastDirection, Topic, TopicBindings, TopicKey};

/// Statistics about bus usage, shared by the whole tree
#[derive(Debug, Clone, Default)]
pub struct BusStats {
    /// Messages accepted by `send_message`
    pub messages_published: u64,
    /// Successful handler invocations
    pub messages_delivered: u64,
    /// Publisher calls dropped for lack of a method binding
    pub unbound_calls: u64,
    /// Handlers that failed or panicked
    pub handler_faults: u64,
    /// Handlers that did not implement the called method
    pub stale_handlers: u64,
    /// Connections created
    pub connections_created: u64,
    /// Connections disposed
    pub connections_disposed: u64,
}

struct DeliveryJob {
    connection: Arc<ConnectionInner>,
    message: Arc<Message>,
}

type SubscriberList = Arc<[Arc<ConnectionInner>]>;

struct RootState {
    config: BusConfig,
    bindings: TopicBindings,
    ids: IdGenerator,
    subscriber_cache: RwLock<HashMap<(Id, TypeId), SubscriberList>>,
    cache_generation: AtomicU64,
    jobs: Mutex<HashMap<ThreadId, VecDeque<DeliveryJob>>>,
    stats: RwLock<BusStats>,
}

impl RootState {
    fn invalidate_topic(&self, topic: TypeId) {
        self.cache_generation.fetch_add(1, Ordering::AcqRel);
        self.subscriber_cache.write().retain(|(_, t), _| *t != topic);
    }

    fn invalidate_all(&self) {
        self.cache_generation.fetch_add(1, Ordering::AcqRel);
        self.subscriber_cache.write().clear();
    }

    /// Drop queued jobs for a connection on every thread
    fn purge_jobs(&self, connection: Id) {
        let mut jobs = self.jobs.lock();
        for queue in jobs.values_mut() {
            queue.retain(|job| job.connection.id() != connection);
        }
        jobs.retain(|_, queue| !queue.is_empty());
    }
}

pub(crate) struct BusInner {
    id: Id,
    name: String,
    parent: Option<Weak<BusInner>>,
    children: RwLock<Vec<Arc<BusInner>>>,
    connections: RwLock<Vec<Arc<ConnectionInner>>>,
    disposed: AtomicBool,
    root: Arc<RootState>,
}

impl BusInner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// First subscription of a topic on some connection in the tree
    pub(crate) fn notify_on_subscription(&self, topic: TopicKey) {
        if self.root.config.strict_topics && !self.root.bindings.contains(topic.name()) {
            log::error!(
                "Subscribing to '{}' which is not a bound topic on bus '{}'",
                topic.name(),
                self.name
            );
        }
        self.root.invalidate_topic(topic.type_id());
    }

    pub(crate) fn remove_connection(&self, id: Id) {
        let removed = {
            let mut connections = self.connections.write();
            let before = connections.len();
            connections.retain(|c| c.id() != id);
            connections.len() != before
        };
        if !removed {
            return;
        }
        self.root.purge_jobs(id);
        self.root.stats.write().connections_disposed += 1;
        self.root.invalidate_all();
    }

    fn reachable_buses(self: &Arc<Self>, direction: BroadcastDirection) -> Vec<Arc<BusInner>> {
        let mut buses = vec![self.clone()];
        match direction {
            BroadcastDirection::Local => {}
            BroadcastDirection::ToChildren => {
                let mut i = 0;
                while i < buses.len() {
                    let children = buses[i].children.read().clone();
                    buses.extend(children);
                    i += 1;
                }
            }
            BroadcastDirection::ToParent => {
                let mut current = self.parent.as_ref().and_then(Weak::upgrade);
                while let Some(bus) = current {
                    current = bus.parent.as_ref().and_then(Weak::upgrade);
                    buses.push(bus);
                }
            }
        }
        buses
    }

    fn subscribers(self: &Arc<Self>, topic: TopicKey, direction: BroadcastDirection) -> SubscriberList {
        let key = (self.id, topic.type_id());
        if let Some(cached) = self.root.subscriber_cache.read().get(&key) {
            return cached.clone();
        }

        let generation = self.root.cache_generation.load(Ordering::Acquire);
        let subscribers: SubscriberList = self
            .reachable_buses(direction)
            .iter()
            .filter(|bus| !bus.is_disposed())
            .flat_map(|bus| bus.connections.read().clone())
            .filter(|c| !c.is_disposed() && c.is_subscribed(topic.type_id()))
            .collect();

        // Skip caching if a subscription changed while we were computing
        let mut cache = self.root.subscriber_cache.write();
        if self.root.cache_generation.load(Ordering::Acquire) == generation {
            cache.insert(key, subscribers.clone());
        }
        subscribers
    }

    fn send_message(self: &Arc<Self>, message: Message, direction: BroadcastDirection) -> BusResult<()> {
        if self.is_disposed() {
            return Err(BusError::Disposed(self.name.clone()));
        }

        let message = Arc::new(message);
        let subscribers = self.subscribers(message.topic(), direction);
        self.root.stats.write().messages_published += 1;
        log::trace!(
            "Publishing {:?} on '{}' to {} connection(s)",
            message,
            self.name,
            subscribers.len()
        );

        if !subscribers.is_empty() {
            let thread = thread::current().id();
            let mut jobs = self.root.jobs.lock();
            let queue = jobs.entry(thread).or_default();
            for connection in subscribers.iter() {
                connection.schedule_message_delivery(message.clone());
                queue.push_back(DeliveryJob {
                    connection: connection.clone(),
                    message: message.clone(),
                });
            }
        }

        match self.root.config.delivery {
            DeliveryMode::Immediate => self.pump_messages(),
            DeliveryMode::Deferred => Ok(()),
        }
    }

    /// Deliver the oldest job queued by the calling thread
    ///
    /// Returns `Ok(false)` when the queue was empty.
    pub(crate) fn deliver_single_message(&self) -> BusResult<bool> {
        let job = {
            let mut jobs = self.root.jobs.lock();
            let thread = thread::current().id();
            let job = jobs.get_mut(&thread).and_then(VecDeque::pop_front);
            if jobs.get(&thread).is_some_and(VecDeque::is_empty) {
                jobs.remove(&thread);
            }
            job
        };

        match job {
            Some(job) => {
                job.connection.deliver_message(&job.message, &self.root.stats)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn pump_messages(&self) -> BusResult<()> {
        while self.deliver_single_message()? {}
        Ok(())
    }

    fn has_undelivered_messages(&self) -> bool {
        self.root
            .jobs
            .lock()
            .get(&thread::current().id())
            .is_some_and(|queue| !queue.is_empty())
    }

    fn dispose(self: &Arc<Self>) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let children = std::mem::take(&mut *self.children.write());
        for child in children {
            child.dispose();
        }

        let connections = self.connections.read().clone();
        for connection in connections {
            connection.dispose();
        }

        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.children.write().retain(|c| c.id != self.id);
        } else {
            self.root.jobs.lock().clear();
        }
        self.root.invalidate_all();
        log::debug!("Message bus '{}' disposed", self.name);
    }
}

/// Handle to a bus in the tree
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Create a root bus
    pub fn new(config: BusConfig) -> Self {
        Self::with_bindings(config, TopicBindings::new())
    }

    /// Create a root bus with a topic binding table
    pub fn with_bindings(config: BusConfig, bindings: TopicBindings) -> Self {
        let root = Arc::new(RootState {
            config,
            bindings,
            ids: IdGenerator::new(),
            subscriber_cache: RwLock::new(HashMap::new()),
            cache_generation: AtomicU64::new(0),
            jobs: Mutex::new(HashMap::new()),
            stats: RwLock::new(BusStats::default()),
        });

        Self {
            inner: Arc::new(BusInner {
                id: root.ids.next(),
                name: "root".to_string(),
                parent: None,
                children: RwLock::new(Vec::new()),
                connections: RwLock::new(Vec::new()),
                disposed: AtomicBool::new(false),
                root,
            }),
        }
    }

    /// Create a child bus; it is disposed together with this one
    pub fn create_child(&self, name: impl Into<String>) -> BusResult<MessageBus> {
        if self.inner.is_disposed() {
            return Err(BusError::Disposed(self.inner.name.clone()));
        }

        let child = Arc::new(BusInner {
            id: self.inner.root.ids.next(),
            name: name.into(),
            parent: Some(Arc::downgrade(&self.inner)),
            children: RwLock::new(Vec::new()),
            connections: RwLock::new(Vec::new()),
            disposed: AtomicBool::new(false),
            root: self.inner.root.clone(),
        });
        self.inner.children.write().push(child.clone());
        self.inner.root.invalidate_all();
        Ok(MessageBus { inner: child })
    }

    /// Bus identifier
    pub fn id(&self) -> Id {
        self.inner.id
    }

    /// Bus name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Parent bus, if this is not the root
    pub fn parent(&self) -> Option<MessageBus> {
        let inner = self.inner.parent.as_ref()?.upgrade()?;
        Some(MessageBus { inner })
    }

    /// Whether this bus was disposed
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Tree-wide configuration
    pub fn config(&self) -> &BusConfig {
        &self.inner.root.config
    }

    /// Tree-wide topic bindings
    pub fn bindings(&self) -> &TopicBindings {
        &self.inner.root.bindings
    }

    /// Open a connection
    pub fn connect(&self) -> Connection {
        let inner = Arc::new(ConnectionInner::new(
            self.inner.root.ids.next(),
            Arc::downgrade(&self.inner),
        ));
        if self.inner.is_disposed() {
            log::warn!("Connecting to disposed bus '{}'", self.inner.name);
            inner.dispose();
        } else {
            self.inner.connections.write().push(inner.clone());
        }
        self.inner.root.stats.write().connections_created += 1;
        Connection { inner }
    }

    /// Open a connection disposed together with `scope`
    pub fn connect_scoped(&self, scope: &DisposalScope) -> Connection {
        let connection = self.connect();
        let weak = Arc::downgrade(&connection.inner);
        let registration = scope.register(move || {
            if let Some(inner) = weak.upgrade() {
                inner.dispose();
            }
        });
        if !connection.is_disposed() {
            connection.inner.attach_scope(scope.clone(), registration);
        }
        connection
    }

    /// Number of live connections on this bus (children excluded)
    pub fn connection_count(&self) -> usize {
        self.inner.connections.read().len()
    }

    /// Publisher for topic `T`
    pub fn publisher<T: Topic>(&self) -> Publisher<T> {
        Publisher::new(self.clone())
    }

    /// Publish one message on topic `T`
    pub fn publish<T: Topic>(&self, message: T::Message) -> BusResult<()> {
        self.publisher::<T>().publish(message)
    }

    /// Drain every message queued by the calling thread
    pub fn pump(&self) -> BusResult<()> {
        self.inner.pump_messages()
    }

    /// Whether the calling thread has queued, undelivered messages
    pub fn has_undelivered_messages(&self) -> bool {
        self.inner.has_undelivered_messages()
    }

    /// Jobs queued across all threads in the tree
    pub fn queued_job_count(&self) -> usize {
        self.inner.root.jobs.lock().values().map(VecDeque::len).sum()
    }

    /// Drop every message queued by `thread`, returning how many were dropped
    ///
    /// Queues belong to the publishing thread and are only drained there, so
    /// messages left behind by a thread that exited without pumping stay
    /// queued until discarded here.
    pub fn discard_thread_queue(&self, thread: ThreadId) -> usize {
        let Some(queue) = self.inner.root.jobs.lock().remove(&thread) else {
            return 0;
        };
        for job in &queue {
            job.connection.discard_pending(thread);
        }
        log::debug!("Discarded {} queued message(s) from {:?}", queue.len(), thread);
        queue.len()
    }

    /// Snapshot of tree-wide statistics
    pub fn stats(&self) -> BusStats {
        self.inner.root.stats.read().clone()
    }

    /// Dispose this bus, its children and all their connections
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub(crate) fn send_message(&self, message: Message, direction: BroadcastDirection) -> BusResult<()> {
        self.inner.send_message(message, direction)
    }

    pub(crate) fn record_unbound_call(&self) {
        self.inner.root.stats.write().unbound_calls += 1;
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl Disposable for MessageBus {
    fn dispose(&self) {
        MessageBus::dispose(self);
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::HandlerError;
    use std::sync::atomic::AtomicU32;

    crate::declare_topic! {
        topic Counter = "test.counter";

        enum CounterEvent {
            Add { n: u32 },
        }
    }

    #[test]
    fn test_publish_reaches_subscriber() {
        let bus = MessageBus::default();
        let total = Arc::new(AtomicU32::new(0));
        let t = total.clone();

        bus.connect().subscribe_fn::<Counter, _>(move |event| {
            let CounterEvent::Add { n } = event;
            t.fetch_add(*n, Ordering::SeqCst);
            Ok(())
        });

        bus.publish::<Counter>(CounterEvent::Add { n: 5 }).unwrap();
        bus.publish::<Counter>(CounterEvent::Add { n: 2 }).unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 7);

        let stats = bus.stats();
        assert_eq!(stats.messages_published, 2);
        assert_eq!(stats.messages_delivered, 2);
    }

    #[test]
    fn test_subscriber_cache_refreshes_on_subscribe() {
        let bus = MessageBus::default();
        let total = Arc::new(AtomicU32::new(0));

        // Populate the cache with an empty subscriber list
        bus.publish::<Counter>(CounterEvent::Add { n: 1 }).unwrap();

        let t = total.clone();
        bus.connect().subscribe_fn::<Counter, _>(move |_| {
            t.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish::<Counter>(CounterEvent::Add { n: 1 }).unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deferred_delivery_waits_for_pump() {
        let bus = MessageBus::new(BusConfig::deferred());
        let total = Arc::new(AtomicU32::new(0));
        let t = total.clone();
        let connection = bus.connect();
        connection.subscribe_fn::<Counter, _>(move |_| {
            t.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish::<Counter>(CounterEvent::Add { n: 1 }).unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 0);
        assert_eq!(connection.pending_count(), 1);
        assert!(bus.has_undelivered_messages());

        bus.pump().unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 1);
        assert!(!bus.has_undelivered_messages());
    }

    #[test]
    fn test_cancellation_propagates_to_publisher() {
        let bus = MessageBus::default();
        let seen = Arc::new(AtomicU32::new(0));
        let s = seen.clone();
        bus.connect().subscribe_fn::<Counter, _>(move |event| {
            let CounterEvent::Add { n } = event;
            s.fetch_add(1, Ordering::SeqCst);
            if *n == 0 {
                return Err(HandlerError::Cancelled);
            }
            Ok(())
        });

        assert_eq!(
            bus.publish::<Counter>(CounterEvent::Add { n: 0 }),
            Err(BusError::Cancelled)
        );
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_on_disposed_bus_fails() {
        let bus = MessageBus::default();
        bus.dispose();
        let result = bus.publish::<Counter>(CounterEvent::Add { n: 1 });
        assert!(matches!(result, Err(BusError::Disposed(_))));
        assert!(bus.create_child("late").is_err());
    }

    #[test]
    fn test_connect_scoped_disposes_with_scope() {
        let bus = MessageBus::default();
        let scope = DisposalScope::new("plugin");
        let connection = bus.connect_scoped(&scope);
        assert_eq!(bus.connection_count(), 1);

        scope.dispose();
        assert!(connection.is_disposed());
        assert_eq!(bus.connection_count(), 0);
    }

    #[test]
    fn test_disposed_connection_leaves_no_queued_jobs() {
        let bus = MessageBus::new(BusConfig::deferred());
        let connection = bus.connect();
        connection.subscribe_fn::<Counter, _>(|_| Ok(()));

        std::thread::scope(|s| {
            for _ in 0..4 {
                let bus = &bus;
                s.spawn(move || {
                    for n in 0..10 {
                        bus.publish::<Counter>(CounterEvent::Add { n }).unwrap();
                    }
                });
            }
        });
        bus.pump().unwrap();
        assert_eq!(bus.queued_job_count(), 40);
        assert_eq!(connection.inner.queued_thread_count(), 4);

        connection.dispose();
        assert_eq!(bus.queued_job_count(), 0);
        assert_eq!(connection.inner.queued_thread_count(), 0);
    }

    #[test]
    fn test_discard_thread_queue_of_exited_thread() {
        let bus = MessageBus::new(BusConfig::deferred());
        let connection = bus.connect();
        connection.subscribe_fn::<Counter, _>(|_| Ok(()));

        let publisher = bus.clone();
        let handle = std::thread::spawn(move || {
            for n in 0..10 {
                publisher.publish::<Counter>(CounterEvent::Add { n }).unwrap();
            }
        });
        let thread = handle.thread().id();
        handle.join().unwrap();

        assert_eq!(bus.discard_thread_queue(thread), 10);
        assert_eq!(bus.discard_thread_queue(thread), 0);
        assert_eq!(bus.queued_job_count(), 0);
        assert_eq!(connection.inner.queued_thread_count(), 0);
        assert_eq!(bus.stats().messages_delivered, 0);
    }

    #[test]
    fn test_connect_on_disposed_bus_is_not_counted_as_disposal() {
        let bus = MessageBus::default();
        bus.dispose();

        let connection = bus.connect();
        assert!(connection.is_disposed());
        let stats = bus.stats();
        assert_eq!(stats.connections_created, 1);
        assert_eq!(stats.connections_disposed, 0);
    }

    #[test]
    fn test_explicit_dispose_unregisters_from_scope() {
        let bus = MessageBus::default();
        let scope = DisposalScope::new("plugin");
        let connection = bus.connect_scoped(&scope);
        assert_eq!(scope.len(), 1);

        connection.dispose();
        assert!(scope.is_empty());
    }
}
