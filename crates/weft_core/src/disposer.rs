//! Disposal scopes
//!
//! A `DisposalScope` owns teardown callbacks for everything registered with
//! it. Disposing the scope runs the callbacks in reverse registration order,
//! exactly once. Child scopes are themselves registered on their parent, so
//! scopes form a tree that tears down leaves first.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::id::{Id, IdGenerator};

static SCOPE_IDS: IdGenerator = IdGenerator::new();

/// Something that can be torn down
pub trait Disposable: Send + Sync {
    /// Release resources; must be idempotent
    fn dispose(&self);
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle returned by `DisposalScope::register`, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Registration {
    scope: Id,
    slot: Id,
}

struct ScopeInner {
    id: Id,
    name: String,
    disposed: AtomicBool,
    slots: IdGenerator,
    teardowns: Mutex<Vec<(Id, Teardown)>>,
}

/// Owner of teardown callbacks
#[derive(Clone)]
pub struct DisposalScope {
    inner: Arc<ScopeInner>,
}

impl DisposalScope {
    /// Create a new root scope
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: SCOPE_IDS.next(),
                name: name.into(),
                disposed: AtomicBool::new(false),
                slots: IdGenerator::new(),
                teardowns: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Scope identifier
    pub fn id(&self) -> Id {
        self.inner.id
    }

    /// Scope name for diagnostics
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether `dispose` has run
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Register a teardown callback
    ///
    /// Registering on an already disposed scope runs `teardown` immediately.
    pub fn register<F>(&self, teardown: F) -> Registration
    where
        F: FnOnce() + Send + 'static,
    {
        let slot = self.inner.slots.next();
        let registration = Registration {
            scope: self.inner.id,
            slot,
        };

        {
            let mut teardowns = self.inner.teardowns.lock();
            if !self.is_disposed() {
                teardowns.push((slot, Box::new(teardown)));
                return registration;
            }
        }

        log::warn!(
            "Registering on disposed scope '{}'; tearing down immediately",
            self.inner.name
        );
        teardown();
        registration
    }

    /// Register a disposable object; the scope keeps it alive until disposal
    pub fn register_disposable(&self, disposable: Arc<dyn Disposable>) -> Registration {
        self.register(move || disposable.dispose())
    }

    /// Remove a previously registered callback without running it
    pub fn unregister(&self, registration: Registration) -> bool {
        if registration.scope != self.inner.id {
            return false;
        }
        let mut teardowns = self.inner.teardowns.lock();
        let before = teardowns.len();
        teardowns.retain(|(slot, _)| *slot != registration.slot);
        teardowns.len() != before
    }

    /// Create a child scope that is disposed together with this one
    pub fn child(&self, name: impl Into<String>) -> DisposalScope {
        let child = DisposalScope::new(name);
        let weak: Weak<ScopeInner> = Arc::downgrade(&child.inner);
        let registration = self.register(move || {
            if let Some(inner) = weak.upgrade() {
                DisposalScope { inner }.dispose();
            }
        });

        // Explicitly disposing the child must not leave a stale slot behind
        let parent = Arc::downgrade(&self.inner);
        child.register(move || {
            if let Some(inner) = parent.upgrade() {
                DisposalScope { inner }.unregister(registration);
            }
        });
        child
    }

    /// Run every teardown in reverse registration order
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let teardowns = std::mem::take(&mut *self.inner.teardowns.lock());
        log::trace!(
            "Disposing scope '{}' ({} teardowns)",
            self.inner.name,
            teardowns.len()
        );
        for (_, teardown) in teardowns.into_iter().rev() {
            teardown();
        }
    }

    /// Number of pending teardowns
    pub fn len(&self) -> usize {
        self.inner.teardowns.lock().len()
    }

    /// Whether no teardowns are pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Disposable for DisposalScope {
    fn dispose(&self) {
        DisposalScope::dispose(self);
    }
}

impl fmt::Debug for DisposalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalScope")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
