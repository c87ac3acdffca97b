//! Listener lists backed by the bus
//!
//! Lets code that thinks in terms of "add a listener object, remove it
//! later" use the bus underneath: each listener gets its own connection, and
//! the list keeps the listener <-> connection pairing.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use weft_core::{DisposalScope, Id, Registration};

use crate::bus::MessageBus;
use crate::connection::Connection;
use crate::listener::TopicListener;
use crate::topic::Topic;

type ListenerKey = usize;

struct Entry<T: Topic> {
    listener: Arc<dyn TopicListener<T>>,
    connection: Connection,
    scope: Option<(DisposalScope, Registration)>,
}

impl<T: Topic> Entry<T> {
    fn release(self) {
        self.connection.dispose();
        if let Some((scope, registration)) = self.scope {
            scope.unregister(registration);
        }
    }
}

type EntryMap<T> = Mutex<HashMap<ListenerKey, Entry<T>>>;

fn key_of<T: Topic>(listener: &Arc<dyn TopicListener<T>>) -> ListenerKey {
    Arc::as_ptr(listener) as *const () as usize
}

/// Set of listeners for topic `T`, each on its own connection
pub struct ListenerList<T: Topic> {
    bus: MessageBus,
    entries: Arc<EntryMap<T>>,
}

impl<T: Topic> ListenerList<T> {
    /// Create an empty list on `bus`
    pub fn new(bus: MessageBus) -> Self {
        Self {
            bus,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe `listener`; adding the same listener twice is a no-op
    pub fn add(&self, listener: Arc<dyn TopicListener<T>>) {
        self.insert(listener);
    }

    /// Subscribe `listener` until `scope` is disposed
    ///
    /// Removing the listener earlier releases its slot on `scope`.
    pub fn add_scoped(&self, listener: Arc<dyn TopicListener<T>>, scope: &DisposalScope) {
        let key = key_of(&listener);
        let Some(connection) = self.insert(listener) else {
            return;
        };

        // Registering on a disposed scope runs the teardown at once, so the
        // entries lock must not be held here
        let entries: Weak<EntryMap<T>> = Arc::downgrade(&self.entries);
        let connection_id = connection.id();
        let registration = scope.register(move || {
            if let Some(entries) = entries.upgrade() {
                if let Some(entry) = take_entry(&entries, key, connection_id) {
                    entry.connection.dispose();
                }
            }
        });

        if let Some(entry) = self.entries.lock().get_mut(&key) {
            if entry.connection.id() == connection_id {
                entry.scope = Some((scope.clone(), registration));
            }
        }
    }

    /// Check and subscribe under one lock; returns the new connection
    fn insert(&self, listener: Arc<dyn TopicListener<T>>) -> Option<Connection> {
        let key = key_of(&listener);
        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            return None;
        }
        let connection = self.bus.connect();
        connection.subscribe_arc::<T>(listener.clone());
        entries.insert(
            key,
            Entry {
                listener,
                connection: connection.clone(),
                scope: None,
            },
        );
        Some(connection)
    }

    /// Unsubscribe `listener`; returns whether it was present
    pub fn remove(&self, listener: &Arc<dyn TopicListener<T>>) -> bool {
        let removed = self.entries.lock().remove(&key_of(listener));
        match removed {
            Some(entry) => {
                entry.release();
                true
            }
            None => false,
        }
    }

    /// Whether `listener` is currently subscribed
    pub fn contains(&self, listener: &Arc<dyn TopicListener<T>>) -> bool {
        self.entries.lock().contains_key(&key_of(listener))
    }

    /// Currently subscribed listeners
    pub fn listeners(&self) -> Vec<Arc<dyn TopicListener<T>>> {
        self.entries.lock().values().map(|e| e.listener.clone()).collect()
    }

    /// Number of subscribed listeners
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unsubscribe everything
    pub fn clear(&self) {
        let drained: Vec<_> = self.entries.lock().drain().map(|(_, e)| e).collect();
        for entry in drained {
            entry.release();
        }
    }
}

/// Remove the entry for `key` only if it still belongs to `connection`
fn take_entry<T: Topic>(
    entries: &EntryMap<T>,
    key: ListenerKey,
    connection: Id,
) -> Option<Entry<T>> {
    let mut entries = entries.lock();
    match entries.get(&key) {
        Some(entry) if entry.connection.id() == connection => entries.remove(&key),
        _ => None,
    }
}

impl<T: Topic> Drop for ListenerList<T> {
    fn drop(&mut self) {
        self.clear();
    }
}
