//! Transactions - single-aspect units of mutation
//!
//! A transaction names the aspect it changes, the scope it changes, and a body
//! that performs the mutation and records change sets through its
//! `TransactionContext`. Bodies may run nested transactions through
//! `TransactionContext::model`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::aspect::AspectId;
use crate::error::ModelResult;
use crate::event::{ChangeSet, ModelEvent};
use crate::host::ChangeScope;
use crate::model::PomModel;

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Create a new unique transaction ID
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

type Body<'a> = Box<dyn FnOnce(&TransactionContext<'_>) -> ModelResult<()> + 'a>;

/// A unit of work on one aspect and one scope
pub struct Transaction<'a> {
    id: TransactionId,
    aspect: AspectId,
    scope: Arc<dyn ChangeScope>,
    description: Option<String>,
    body: Body<'a>,
}

impl<'a> Transaction<'a> {
    /// Create a transaction
    pub fn new<F>(aspect: AspectId, scope: Arc<dyn ChangeScope>, body: F) -> Self
    where
        F: FnOnce(&TransactionContext<'_>) -> ModelResult<()> + 'a,
    {
        Self {
            id: TransactionId::new(),
            aspect,
            scope,
            description: None,
            body: Box::new(body),
        }
    }

    /// Attach a human-readable description for logs
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Transaction identifier
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Aspect this transaction changes
    pub fn aspect(&self) -> AspectId {
        self.aspect
    }

    /// Scope this transaction changes
    pub fn scope(&self) -> &Arc<dyn ChangeScope> {
        &self.scope
    }

    /// Description, if any
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) fn into_parts(self) -> (TransactionId, AspectId, Arc<dyn ChangeScope>, Body<'a>) {
        (self.id, self.aspect, self.scope, self.body)
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("aspect", &self.aspect)
            .field("scope", &self.scope)
            .field("description", &self.description)
            .finish()
    }
}

/// What a running body sees
///
/// The accumulated event is shared with nested transactions that merge into
/// it, so access is short and scoped. Do not run a nested transaction from
/// inside `with_event`.
pub struct TransactionContext<'m> {
    model: &'m PomModel,
    id: TransactionId,
    aspect: AspectId,
    scope: Arc<dyn ChangeScope>,
    event: Arc<Mutex<ModelEvent>>,
}

impl<'m> TransactionContext<'m> {
    pub(crate) fn new(
        model: &'m PomModel,
        id: TransactionId,
        aspect: AspectId,
        scope: Arc<dyn ChangeScope>,
        event: Arc<Mutex<ModelEvent>>,
    ) -> Self {
        Self {
            model,
            id,
            aspect,
            scope,
            event,
        }
    }

    /// Model running this transaction
    pub fn model(&self) -> &'m PomModel {
        self.model
    }

    /// Running transaction's id
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Running transaction's aspect
    pub fn aspect(&self) -> AspectId {
        self.aspect
    }

    /// Running transaction's scope
    pub fn scope(&self) -> &Arc<dyn ChangeScope> {
        &self.scope
    }

    /// Record a change set, merging with one already recorded for `aspect`
    pub fn record(&self, aspect: AspectId, change_set: impl ChangeSet) {
        self.event.lock().record(aspect, Box::new(change_set));
    }

    /// Run `f` against the accumulated event
    pub fn with_event<R>(&self, f: impl FnOnce(&mut ModelEvent) -> R) -> R {
        f(&mut self.event.lock())
    }

    /// Aspects changed so far, including merged nested transactions
    pub fn changed_aspects(&self) -> Vec<AspectId> {
        self.event.lock().changed_aspects()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FileId, FileScope};

    #[test]
    fn test_transaction_ids_are_unique() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn test_transaction_accessors() {
        let scope: Arc<dyn ChangeScope> = Arc::new(FileScope::file(FileId::from_raw(1)));
        let tx = Transaction::new(AspectId::named("tree"), scope, |_| Ok(()))
            .with_description("rename symbol");

        assert_eq!(tx.aspect(), AspectId::named("tree"));
        assert_eq!(tx.description(), Some("rename symbol"));
        assert_eq!(tx.scope().containing_file(), Some(FileId::from_raw(1)));
    }
}
