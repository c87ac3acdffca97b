//! # weft_bus - Topic Message Bus
//!
//! Typed publish/subscribe between loosely coupled components.
//!
//! ## Architecture
//!
//! ```text
//! Publisher<T> ──► MessageBus ──► per-thread job queue ──► Connection ──► TopicListener<T>
//!                      │
//!                      └── child buses (reach depends on the topic's direction)
//! ```
//!
//! ## Key Concepts
//!
//! - **Topic**: a marker type plus an enum of method calls, see [`declare_topic!`]
//! - **Connection**: a subscriber scope with its own per-thread FIFO queue
//! - **Publisher**: matches each call against the topic's bindings and enqueues it
//! - **TopicBindings**: the method table actually installed, so stale callers
//!   degrade to logged no-ops
//!
//! Delivery order is FIFO per (connection, publishing thread). Handlers run
//! with no bus lock held, so they may publish and subscribe freely.

pub mod bus;
pub mod config;
pub mod connection;
pub mod error;
pub mod listener;
pub mod listener_list;
pub mod message;
pub mod publisher;
pub mod topic;

pub use bus::{BusStats, MessageBus};
pub use config::{BusConfig, DeliveryMode};
pub use connection::Connection;
pub use error::{BusError, BusResult};
pub use listener::{FnListener, HandlerError, HandlerResult, TopicListener};
pub use listener_list::ListenerList;
pub use message::Message;
pub use publisher::Publisher;
pub use topic::{BroadcastDirection, MethodDescriptor, Topic, TopicBindings, TopicKey, TopicMessage};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bus::MessageBus;
    pub use crate::connection::Connection;
    pub use crate::error::{BusError, BusResult};
    pub use crate::listener::{HandlerError, HandlerResult, TopicListener};
    pub use crate::topic::{Topic, TopicMessage};
    pub use crate::declare_topic;
}
