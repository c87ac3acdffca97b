//! Connections - one subscriber scope on a bus
//!
//! A connection owns two things:
//! - a copy-on-write subscription map (topic -> handlers); readers take a
//!   snapshot and never block, every subscribe publishes a new map
//! - per-thread FIFO queues of messages scheduled for it
//!
//! Delivery order is guaranteed per (connection, publishing thread) only.

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use weft_core::{Disposable, DisposalScope, Id, Registration};

use crate::bus::{BusInner, BusStats};
use crate::error::BusResult;
use crate::listener::{FnListener, HandlerResult, Handlers, TopicListener};
use crate::message::Message;
use crate::topic::{Topic, TopicKey};

type SubscriptionMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

pub(crate) struct ConnectionInner {
    id: Id,
    bus: Weak<BusInner>,
    subscriptions: ArcSwap<SubscriptionMap>,
    pending: Mutex<HashMap<ThreadId, VecDeque<Arc<Message>>>>,
    disposed: AtomicBool,
    scope: Mutex<Option<(DisposalScope, Registration)>>,
}

impl ConnectionInner {
    pub(crate) fn new(id: Id, bus: Weak<BusInner>) -> Self {
        Self {
            id,
            bus,
            subscriptions: ArcSwap::from_pointee(SubscriptionMap::new()),
            pending: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
            scope: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> Id {
        self.id
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn is_subscribed(&self, topic: TypeId) -> bool {
        self.subscriptions.load().contains_key(&topic)
    }

    fn subscribe<T: Topic>(&self, listener: Arc<dyn TopicListener<T>>) {
        if self.is_disposed() {
            log::warn!("Subscribing to '{}' on disposed connection {}; ignored", T::NAME, self.id);
            return;
        }

        let key = TypeId::of::<T>();
        let previous = self.subscriptions.rcu(|current| {
            let handlers = match current.get(&key).and_then(|h| h.downcast_ref::<Handlers<T>>()) {
                Some(existing) => existing.with(listener.clone()),
                None => Handlers::Single(listener.clone()),
            };
            let mut next = SubscriptionMap::clone(current);
            next.insert(key, Arc::new(handlers) as Arc<dyn Any + Send + Sync>);
            next
        });

        if !previous.contains_key(&key) {
            if let Some(bus) = self.bus.upgrade() {
                bus.notify_on_subscription(TopicKey::of::<T>());
            }
        }
    }

    fn handler_count<T: Topic>(&self) -> usize {
        self.subscriptions
            .load()
            .get(&TypeId::of::<T>())
            .and_then(|h| h.downcast_ref::<Handlers<T>>())
            .map_or(0, Handlers::len)
    }

    /// Enqueue on the calling thread's queue
    pub(crate) fn schedule_message_delivery(&self, message: Arc<Message>) {
        self.pending
            .lock()
            .entry(thread::current().id())
            .or_default()
            .push_back(message);
    }

    /// Dequeue `message` from the calling thread's queue and run handlers
    pub(crate) fn deliver_message(
        &self,
        message: &Arc<Message>,
        stats: &RwLock<BusStats>,
    ) -> BusResult<()> {
        let polled = {
            let mut pending = self.pending.lock();
            let thread = thread::current().id();
            let polled = pending.get_mut(&thread).and_then(VecDeque::pop_front);
            if pending.get(&thread).is_some_and(VecDeque::is_empty) {
                pending.remove(&thread);
            }
            polled
        };

        if self.is_disposed() {
            return Ok(());
        }

        match polled {
            Some(ref head) if Arc::ptr_eq(head, message) => {}
            other => {
                log::error!(
                    "Queue corruption on connection {}: expected {:?}, polled {:?}",
                    self.id,
                    message,
                    other
                );
                return Ok(());
            }
        }

        // Snapshot: subscriptions made by handlers below do not see this message
        let Some(handlers) = self.subscriptions.load().get(&message.topic().type_id()).cloned() else {
            return Ok(());
        };
        message.invoke(handlers.as_ref(), stats)
    }

    /// Messages queued by the calling thread
    pub(crate) fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .get(&thread::current().id())
            .map_or(0, VecDeque::len)
    }

    /// Drop everything queued by `thread`
    pub(crate) fn discard_pending(&self, thread: ThreadId) {
        self.pending.lock().remove(&thread);
    }

    #[cfg(test)]
    pub(crate) fn queued_thread_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub(crate) fn attach_scope(&self, scope: DisposalScope, registration: Registration) {
        *self.scope.lock() = Some((scope, registration));
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.subscriptions.store(Arc::new(SubscriptionMap::new()));
        self.pending.lock().clear();

        if let Some((scope, registration)) = self.scope.lock().take() {
            scope.unregister(registration);
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove_connection(self.id);
        }
        log::trace!("Connection {} disposed", self.id);
    }
}

/// A subscriber scope on a `MessageBus`
#[derive(Clone)]
pub struct Connection {
    pub(crate) inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Connection identifier
    pub fn id(&self) -> Id {
        self.inner.id
    }

    /// Subscribe a listener to topic `T`
    ///
    /// Several listeners for one topic are invoked in subscription order.
    pub fn subscribe<T, L>(&self, listener: L)
    where
        T: Topic,
        L: TopicListener<T>,
    {
        self.inner.subscribe::<T>(Arc::new(listener));
    }

    /// Subscribe a shared listener to topic `T`
    pub fn subscribe_arc<T: Topic>(&self, listener: Arc<dyn TopicListener<T>>) {
        self.inner.subscribe::<T>(listener);
    }

    /// Subscribe a closure to topic `T`
    pub fn subscribe_fn<T, F>(&self, f: F)
    where
        T: Topic,
        F: Fn(&T::Message) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner.subscribe::<T>(Arc::new(FnListener::<T, F>::new(f)));
    }

    /// Whether any listener is subscribed to `T`
    pub fn is_subscribed<T: Topic>(&self) -> bool {
        self.inner.is_subscribed(TypeId::of::<T>())
    }

    /// Number of listeners subscribed to `T`
    pub fn handler_count<T: Topic>(&self) -> usize {
        self.inner.handler_count::<T>()
    }

    /// Messages waiting for this connection on the calling thread
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count()
    }

    /// Drain this connection's queue on the calling thread
    ///
    /// Messages queued earlier for other connections are delivered on the way,
    /// preserving per-thread publication order.
    pub fn deliver_immediately(&self) -> BusResult<()> {
        let Some(bus) = self.inner.bus.upgrade() else {
            return Ok(());
        };
        while self.inner.pending_count() > 0 {
            if !bus.deliver_single_message()? {
                break;
            }
        }
        Ok(())
    }

    /// Whether the connection was disposed
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Unsubscribe everything and drop pending messages
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Disposable for Connection {
    fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
