//! Model listeners

use std::collections::HashSet;
use std::fmt;

use weft_core::Id;

use crate::aspect::AspectId;
use crate::event::ModelEvent;

/// Identifies a registered model listener
pub type ListenerId = Id;

/// Receives committed model events
pub trait PomModelListener: Send + Sync {
    /// Whether a change to `aspect` should trigger `model_changed`
    fn is_aspect_change_interesting(&self, aspect: AspectId) -> bool;

    /// Called at most once per committed transaction
    fn model_changed(&self, event: &ModelEvent);
}

/// Listener built from an aspect set and a closure
pub struct AspectListener<F> {
    aspects: HashSet<AspectId>,
    on_change: F,
}

impl<F> AspectListener<F>
where
    F: Fn(&ModelEvent) + Send + Sync,
{
    /// Listen for changes to any of `aspects`
    pub fn new(aspects: impl IntoIterator<Item = AspectId>, on_change: F) -> Self {
        Self {
            aspects: aspects.into_iter().collect(),
            on_change,
        }
    }
}

impl<F> PomModelListener for AspectListener<F>
where
    F: Fn(&ModelEvent) + Send + Sync,
{
    fn is_aspect_change_interesting(&self, aspect: AspectId) -> bool {
        self.aspects.contains(&aspect)
    }

    fn model_changed(&self, event: &ModelEvent) {
        (self.on_change)(event)
    }
}

impl<F> fmt::Debug for AspectListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectListener")
            .field("aspects", &self.aspects)
            .finish()
    }
}
