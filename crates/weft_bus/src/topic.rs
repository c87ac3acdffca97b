//! Topics - typed message contracts
//!
//! A topic is a marker type plus an enum of method-call variants. Each
//! variant maps to a `MethodDescriptor` (name and parameter type names), and
//! the topic publishes a static table of the descriptors it declares. The
//! table is what publishers match calls against, so a binary built against
//! an older topic shape degrades to a logged no-op instead of a crash.
//!
//! Use [`declare_topic!`](crate::declare_topic) to generate all three pieces.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Which buses in the tree a publication reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BroadcastDirection {
    /// The publishing bus and all of its descendants
    #[default]
    ToChildren,
    /// The publishing bus and all of its ancestors
    ToParent,
    /// Only the publishing bus
    Local,
}

/// Shape of one topic method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Method name
    pub name: &'static str,
    /// Parameter type names, in order
    pub params: &'static [&'static str],
}

impl MethodDescriptor {
    /// Create a descriptor
    pub const fn new(name: &'static str, params: &'static [&'static str]) -> Self {
        Self { name, params }
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Structural match: same name, same arity, same parameter types
    pub fn matches(&self, other: &MethodDescriptor) -> bool {
        self.name == other.name
            && self.arity() == other.arity()
            && self.params.iter().zip(other.params).all(|(a, b)| a == b)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// A message enum that knows which topic method each variant calls
pub trait TopicMessage: fmt::Debug + Send + Sync + 'static {
    /// Descriptor of the method this value represents
    fn descriptor(&self) -> MethodDescriptor;
}

/// A typed message contract
pub trait Topic: Send + Sync + 'static {
    /// The method-call enum carried by this topic
    type Message: TopicMessage;

    /// Stable display name, also the key into `TopicBindings`
    const NAME: &'static str;

    /// How far publications travel through the bus tree
    const DIRECTION: BroadcastDirection = BroadcastDirection::ToChildren;

    /// Methods this topic declares
    fn methods() -> &'static [MethodDescriptor];
}

/// Runtime identity of a topic
#[derive(Clone, Copy)]
pub struct TopicKey {
    type_id: TypeId,
    name: &'static str,
}

impl TopicKey {
    /// Key for topic `T`
    pub fn of<T: Topic>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::NAME,
        }
    }

    /// Type identity
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Topic name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TopicKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TopicKey {}

impl Hash for TopicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicKey({})", self.name)
    }
}

/// Read-only lookup table from topic name to declared methods
///
/// Supplied once at bus construction, typically by whatever loads the
/// installed plugins. Topics not present in the table fall back to their
/// own compiled `Topic::methods`.
#[derive(Debug, Clone, Default)]
pub struct TopicBindings {
    topics: HashMap<&'static str, &'static [MethodDescriptor]>,
}

impl TopicBindings {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a topic to its compiled method table
    pub fn with_topic<T: Topic>(mut self) -> Self {
        self.insert(T::NAME, T::methods());
        self
    }

    /// Bind a topic name to an explicit method table
    pub fn insert(&mut self, topic: &'static str, methods: &'static [MethodDescriptor]) {
        self.topics.insert(topic, methods);
    }

    /// Whether the table knows this topic
    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    /// Methods bound to a topic name
    pub fn methods(&self, topic: &str) -> Option<&'static [MethodDescriptor]> {
        self.topics.get(topic).copied()
    }

    /// Find the bound descriptor structurally matching `called`
    pub fn resolve(&self, topic: &str, called: &MethodDescriptor) -> Option<MethodDescriptor> {
        self.methods(topic)?
            .iter()
            .find(|method| method.matches(called))
            .copied()
    }

    /// Number of bound topics
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether no topics are bound
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Declare a topic marker type, its message enum and its method table
///
/// ```
/// weft_bus::declare_topic! {
///     /// Fired when documents change on disk
///     pub topic DocumentEvents = "document.events";
///
///     pub enum DocumentEvent {
///         Saved { path: String },
///         Reloaded { path: String, external: bool },
///     }
/// }
///
/// use weft_bus::{Topic, TopicMessage};
/// let event = DocumentEvent::Saved { path: "a.txt".into() };
/// assert_eq!(event.descriptor().name, "Saved");
/// assert_eq!(DocumentEvents::methods().len(), 2);
/// ```
///
/// An optional `direction = ToParent;` (or `Local`) line after the topic
/// name overrides the default `ToChildren` broadcast.
#[macro_export]
macro_rules! declare_topic {
    (
        $(#[$topic_meta:meta])*
        $vis:vis topic $topic:ident = $name:literal;
        $(#[$msg_meta:meta])*
        $msg_vis:vis enum $message:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident { $($field:ident : $ty:ty),* $(,)? }
            ),* $(,)?
        }
    ) => {
        $crate::declare_topic! {
            $(#[$topic_meta])*
            $vis topic $topic = $name, direction = ToChildren;
            $(#[$msg_meta])*
            $msg_vis enum $message {
                $(
                    $(#[$var_meta])*
                    $variant { $($field : $ty),* }
                ),*
            }
        }
    };
    (
        $(#[$topic_meta:meta])*
        $vis:vis topic $topic:ident = $name:literal, direction = $direction:ident;
        $(#[$msg_meta:meta])*
        $msg_vis:vis enum $message:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident { $($field:ident : $ty:ty),* $(,)? }
            ),* $(,)?
        }
    ) => {
        $(#[$topic_meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $topic;

        $(#[$msg_meta])*
        #[derive(Debug, Clone)]
        $msg_vis enum $message {
            $(
                $(#[$var_meta])*
                $variant { $($field : $ty),* }
            ),*
        }

        impl $crate::TopicMessage for $message {
            fn descriptor(&self) -> $crate::MethodDescriptor {
                match self {
                    $(
                        $message::$variant { .. } => $crate::MethodDescriptor::new(
                            stringify!($variant),
                            &[$(stringify!($ty)),*],
                        ),
                    )*
                }
            }
        }

        impl $crate::Topic for $topic {
            type Message = $message;
            const NAME: &'static str = $name;
            const DIRECTION: $crate::BroadcastDirection = $crate::BroadcastDirection::$direction;

            fn methods() -> &'static [$crate::MethodDescriptor] {
                const METHODS: &[$crate::MethodDescriptor] = &[
                    $(
                        $crate::MethodDescriptor::new(stringify!($variant), &[$(stringify!($ty)),*]),
                    )*
                ];
                METHODS
            }
        }
    };
}
