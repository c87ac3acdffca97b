//! Aspects and their dependency graph
//!
//! An aspect is one facet of the program model (tree structure, language
//! data, ...). Aspects declare which aspects they depend on; the graph keeps
//! two derived tables:
//!
//! - `incidence[a]`: what `a` depends on, plus `a` itself
//! - `dependants[d]`: every aspect whose incidence contains `d`
//!
//! Incidence is flattened one level at registration: each declared
//! dependency contributes its own, already computed incidence. Register
//! aspects in dependency order and the closure is complete. Cycles are not
//! detected.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, ModelResult};
use crate::event::ModelEvent;

/// Identity of an aspect
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AspectId(&'static str);

impl AspectId {
    /// Aspect identified by an explicit name
    pub const fn named(name: &'static str) -> Self {
        Self(name)
    }

    /// Aspect identified by a Rust type
    pub fn of<A: ?Sized + 'static>() -> Self {
        Self(type_name::<A>())
    }

    /// Aspect name
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for AspectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aspect({})", self.0)
    }
}

impl fmt::Display for AspectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A facet of the program model
pub trait Aspect: Send + Sync + 'static {
    /// Called after a committed transaction changed an aspect this one
    /// depends on (and this one was not itself changed)
    fn update(&self, event: &ModelEvent) {
        let _ = event;
    }
}

/// Registered aspects and their incidence tables
#[derive(Default)]
pub struct AspectGraph {
    aspects: HashMap<AspectId, Arc<dyn Aspect>>,
    order: Vec<AspectId>,
    incidence: HashMap<AspectId, Vec<AspectId>>,
    dependants: HashMap<AspectId, Vec<AspectId>>,
}

impl AspectGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `aspect` under `id` with its direct dependencies
    pub fn register(
        &mut self,
        id: AspectId,
        aspect: Arc<dyn Aspect>,
        dependencies: &[AspectId],
    ) -> ModelResult<()> {
        if self.aspects.contains_key(&id) {
            return Err(ModelError::AlreadyRegistered(id));
        }

        let mut closure = Vec::new();
        for dependency in dependencies {
            for d in self.incidence_or_self(*dependency) {
                push_unique(&mut closure, d);
            }
        }
        // Self-incidence makes same-aspect nesting merge
        push_unique(&mut closure, id);

        for d in &closure {
            push_unique(self.dependants.entry(*d).or_default(), id);
        }

        self.incidence.insert(id, closure);
        self.aspects.insert(id, aspect);
        self.order.push(id);
        Ok(())
    }

    fn incidence_or_self(&self, id: AspectId) -> Vec<AspectId> {
        match self.incidence.get(&id) {
            Some(closure) => closure.clone(),
            None => vec![id],
        }
    }

    /// Registered aspect instance
    pub fn aspect(&self, id: AspectId) -> Option<Arc<dyn Aspect>> {
        self.aspects.get(&id).cloned()
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: AspectId) -> bool {
        self.aspects.contains_key(&id)
    }

    /// What `id` depends on, including itself; empty if unregistered
    pub fn incidence(&self, id: AspectId) -> &[AspectId] {
        self.incidence.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Aspects depending on `id`, in registration order
    pub fn dependants(&self, id: AspectId) -> &[AspectId] {
        self.dependants.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Registered aspect ids, in registration order
    pub fn registered(&self) -> &[AspectId] {
        &self.order
    }

    /// Number of registered aspects
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no aspects are registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for AspectGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectGraph")
            .field("aspects", &self.order)
            .field("incidence", &self.incidence)
            .finish()
    }
}

fn push_unique(list: &mut Vec<AspectId>, id: AspectId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// Registration surface handed to aspect providers
pub trait AspectRegistrator {
    /// Register an aspect with its direct dependencies
    fn register(
        &self,
        id: AspectId,
        aspect: Arc<dyn Aspect>,
        dependencies: &[AspectId],
    ) -> ModelResult<()>;

    /// Look up an aspect registered earlier
    fn model_aspect(&self, id: AspectId) -> Option<Arc<dyn Aspect>>;
}

/// Something that contributes aspects to a model at startup
pub trait AspectProvider {
    /// Register this provider's aspects
    fn register(&self, registrator: &dyn AspectRegistrator) -> ModelResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    impl Aspect for Plain {}

    const TREE: AspectId = AspectId::named("tree");
    const LANGUAGE: AspectId = AspectId::named("language");
    const INDEX: AspectId = AspectId::named("index");

    #[test]
    fn test_incidence_contains_dependencies_and_self() {
        let mut graph = AspectGraph::new();
        graph.register(TREE, Arc::new(Plain), &[]).unwrap();
        graph.register(LANGUAGE, Arc::new(Plain), &[TREE]).unwrap();

        assert_eq!(graph.incidence(TREE), &[TREE]);
        assert_eq!(graph.incidence(LANGUAGE), &[TREE, LANGUAGE]);
        assert_eq!(graph.dependants(TREE), &[TREE, LANGUAGE]);
        assert_eq!(graph.dependants(LANGUAGE), &[LANGUAGE]);
    }

    #[test]
    fn test_chain_closes_when_registered_in_order() {
        let mut graph = AspectGraph::new();
        graph.register(TREE, Arc::new(Plain), &[]).unwrap();
        graph.register(LANGUAGE, Arc::new(Plain), &[TREE]).unwrap();
        graph.register(INDEX, Arc::new(Plain), &[LANGUAGE]).unwrap();

        assert_eq!(graph.incidence(INDEX), &[TREE, LANGUAGE, INDEX]);
        assert!(graph.dependants(TREE).contains(&INDEX));
    }

    #[test]
    fn test_unregistered_dependency_contributes_itself_only() {
        let mut graph = AspectGraph::new();
        graph.register(INDEX, Arc::new(Plain), &[LANGUAGE]).unwrap();
        graph.register(LANGUAGE, Arc::new(Plain), &[TREE]).unwrap();

        // One-level flattening: INDEX never learns about TREE
        assert_eq!(graph.incidence(INDEX), &[LANGUAGE, INDEX]);
        assert!(!graph.dependants(TREE).contains(&INDEX));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut graph = AspectGraph::new();
        graph.register(TREE, Arc::new(Plain), &[]).unwrap();
        let err = graph.register(TREE, Arc::new(Plain), &[]).unwrap_err();
        assert!(matches!(err, ModelError::AlreadyRegistered(id) if id == TREE));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_type_keyed_ids() {
        assert_eq!(AspectId::of::<Plain>(), AspectId::of::<Plain>());
        assert_ne!(AspectId::of::<Plain>(), TREE);
        assert!(AspectId::of::<Plain>().name().ends_with("Plain"));
    }
}
