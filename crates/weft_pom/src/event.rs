//! Model events - what a transaction changed
//!
//! A `ModelEvent` maps each changed aspect to that aspect's change set. When a
//! nested transaction is absorbed by a blocking outer one, its event is merged
//! into the outer event: aspects are unioned, and change sets present on both
//! sides are merged by the change set itself.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::aspect::AspectId;
use crate::host::ChangeScope;

/// Per-aspect record of what changed
pub trait ChangeSet: Any + Send + fmt::Debug {
    /// Absorb a change set for the same aspect from a nested transaction
    fn merge(&mut self, other: Box<dyn ChangeSet>);

    /// A nested transaction is about to run and may merge into this set
    fn before_nested_transaction(&mut self) {}

    /// Upcast for typed access
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed mutable access
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Upcast by value, used when merging
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Accumulated changes of one transaction
#[derive(Default)]
pub struct ModelEvent {
    scope: Option<Arc<dyn ChangeScope>>,
    change_sets: Vec<(AspectId, Box<dyn ChangeSet>)>,
}

impl ModelEvent {
    /// Empty event with no scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty event for a transaction on `scope`
    pub fn for_scope(scope: Arc<dyn ChangeScope>) -> Self {
        Self {
            scope: Some(scope),
            change_sets: Vec::new(),
        }
    }

    /// Scope of the transaction that produced this event
    pub fn scope(&self) -> Option<&Arc<dyn ChangeScope>> {
        self.scope.as_ref()
    }

    /// Set (or replace) the change set for `aspect`
    pub fn register_change_set(&mut self, aspect: AspectId, change_set: Box<dyn ChangeSet>) {
        match self.change_sets.iter_mut().find(|(id, _)| *id == aspect) {
            Some(slot) => slot.1 = change_set,
            None => self.change_sets.push((aspect, change_set)),
        }
    }

    /// Record a change set, merging with an existing one for `aspect`
    pub fn record(&mut self, aspect: AspectId, change_set: Box<dyn ChangeSet>) {
        match self.change_sets.iter_mut().find(|(id, _)| *id == aspect) {
            Some(slot) => slot.1.merge(change_set),
            None => self.change_sets.push((aspect, change_set)),
        }
    }

    /// Drop the change set for `aspect`
    pub fn remove_change_set(&mut self, aspect: AspectId) -> Option<Box<dyn ChangeSet>> {
        let index = self.change_sets.iter().position(|(id, _)| *id == aspect)?;
        Some(self.change_sets.remove(index).1)
    }

    /// Change set recorded for `aspect`
    pub fn change_set(&self, aspect: AspectId) -> Option<&dyn ChangeSet> {
        self.change_sets
            .iter()
            .find(|(id, _)| *id == aspect)
            .map(|(_, set)| &**set)
    }

    /// Typed change set recorded for `aspect`
    pub fn change_set_as<C: ChangeSet>(&self, aspect: AspectId) -> Option<&C> {
        self.change_set(aspect)?.as_any().downcast_ref::<C>()
    }

    /// Typed mutable change set recorded for `aspect`
    pub fn change_set_as_mut<C: ChangeSet>(&mut self, aspect: AspectId) -> Option<&mut C> {
        self.change_sets
            .iter_mut()
            .find(|(id, _)| *id == aspect)?
            .1
            .as_any_mut()
            .downcast_mut::<C>()
    }

    /// Aspects with a change set, in recording order
    pub fn changed_aspects(&self) -> Vec<AspectId> {
        self.change_sets.iter().map(|(id, _)| *id).collect()
    }

    /// Whether `aspect` changed
    pub fn is_changed(&self, aspect: AspectId) -> bool {
        self.change_sets.iter().any(|(id, _)| *id == aspect)
    }

    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.change_sets.is_empty()
    }

    /// Absorb a nested transaction's event
    pub fn merge(&mut self, other: ModelEvent) {
        for (aspect, change_set) in other.change_sets {
            self.record(aspect, change_set);
        }
    }

    /// Give every change set a chance to prepare for a nested merge
    pub fn before_nested_transaction(&mut self) {
        for (_, change_set) in &mut self.change_sets {
            change_set.before_nested_transaction();
        }
    }
}

impl fmt::Debug for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEvent")
            .field("scope", &self.scope)
            .field("changed", &self.changed_aspects())
            .finish()
    }
}

/// General-purpose change set: an ordered list of entries
///
/// Merging appends the other log's entries. Each nested transaction boundary
/// is remembered as an index into the entry list.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLog<T> {
    entries: Vec<T>,
    nested_marks: Vec<usize>,
}

impl<T> ChangeLog<T> {
    /// Empty log
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            nested_marks: Vec::new(),
        }
    }

    /// Log holding a single entry
    pub fn single(entry: T) -> Self {
        Self {
            entries: vec![entry],
            nested_marks: Vec::new(),
        }
    }

    /// Append an entry
    pub fn push(&mut self, entry: T) {
        self.entries.push(entry);
    }

    /// Recorded entries
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Entry counts at the start of each nested transaction
    pub fn nested_marks(&self) -> &[usize] {
        &self.nested_marks
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for ChangeLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChangeSet for ChangeLog<T>
where
    T: fmt::Debug + Send + 'static,
{
    fn merge(&mut self, other: Box<dyn ChangeSet>) {
        match other.into_any().downcast::<ChangeLog<T>>() {
            Ok(other) => {
                let offset = self.entries.len();
                self.nested_marks
                    .extend(other.nested_marks.iter().map(|mark| mark + offset));
                self.entries.extend(other.entries);
            }
            Err(_) => log::error!(
                "Cannot merge a foreign change set into ChangeLog<{}>",
                std::any::type_name::<T>()
            ),
        }
    }

    fn before_nested_transaction(&mut self) {
        self.nested_marks.push(self.entries.len());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: AspectId = AspectId::named("tree");
    const LANGUAGE: AspectId = AspectId::named("language");

    fn log(entries: &[&'static str]) -> Box<dyn ChangeSet> {
        let mut log = ChangeLog::new();
        for e in entries {
            log.push(*e);
        }
        Box::new(log)
    }

    #[test]
    fn test_merge_unions_aspects_and_merges_sets() {
        let mut outer = ModelEvent::new();
        outer.register_change_set(TREE, log(&["insert"]));

        let mut inner = ModelEvent::new();
        inner.register_change_set(TREE, log(&["delete"]));
        inner.register_change_set(LANGUAGE, log(&["reresolve"]));

        outer.merge(inner);

        assert_eq!(outer.changed_aspects(), vec![TREE, LANGUAGE]);
        let tree = outer.change_set_as::<ChangeLog<&str>>(TREE).unwrap();
        assert_eq!(tree.entries(), &["insert", "delete"]);
    }

    #[test]
    fn test_before_nested_marks_boundary() {
        let mut event = ModelEvent::new();
        event.register_change_set(TREE, log(&["a", "b"]));
        event.before_nested_transaction();

        let tree = event.change_set_as::<ChangeLog<&str>>(TREE).unwrap();
        assert_eq!(tree.nested_marks(), &[2]);
    }

    #[test]
    fn test_merge_keeps_inner_marks_offset() {
        let mut inner = ChangeLog::new();
        inner.push("rename");
        inner.before_nested_transaction();
        inner.push("reindent");

        let mut outer = ChangeLog::new();
        outer.push("insert");
        outer.push("delete");
        outer.before_nested_transaction();
        outer.merge(Box::new(inner));

        assert_eq!(outer.entries(), &["insert", "delete", "rename", "reindent"]);
        assert_eq!(outer.nested_marks(), &[2, 3]);
    }

    #[test]
    fn test_register_replaces_record_merges() {
        let mut event = ModelEvent::new();
        event.register_change_set(TREE, log(&["a"]));
        event.register_change_set(TREE, log(&["b"]));
        event.record(TREE, log(&["c"]));

        let tree = event.change_set_as::<ChangeLog<&str>>(TREE).unwrap();
        assert_eq!(tree.entries(), &["b", "c"]);

        event
            .change_set_as_mut::<ChangeLog<&str>>(TREE)
            .unwrap()
            .push("d");
        assert_eq!(event.change_set_as::<ChangeLog<&str>>(TREE).unwrap().len(), 3);

        assert!(event.remove_change_set(TREE).is_some());
        assert!(event.is_empty());
    }

    #[test]
    fn test_foreign_change_set_is_not_merged() {
        let mut event = ModelEvent::new();
        event.register_change_set(TREE, log(&["a"]));
        event.record(TREE, Box::new(ChangeLog::single(7u32)));

        let tree = event.change_set_as::<ChangeLog<&str>>(TREE).unwrap();
        assert_eq!(tree.entries(), &["a"]);
    }
}
