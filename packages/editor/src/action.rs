//! # Actions
//!
//! An action is a reusable edit: given a graph (and a progress value for
//! animated edits) it returns a new graph. Actions never mutate their input
//! and must be referentially transparent, so the history can replay the same
//! action at increasing progress values during a transition without
//! recording anything per frame.

use std::fmt;
use std::sync::Arc;

use mapedit_graph::Graph;

use crate::{DisabledReason, EditError};

/// A first-class edit operation
///
/// Each action provides:
/// - Apply logic
/// - An optional side-effect free precondition
/// - Whether it accepts an eased progress value
pub trait Action: Send + Sync {
    /// Apply this action to `graph`
    ///
    /// Non-transitionable actions ignore `progress`; transitionable ones
    /// clamp it to `0..=1`.
    fn apply(&self, graph: &Graph, progress: f64) -> Result<Graph, EditError>;

    /// Reason this action should not be offered, if any
    fn disabled(&self, _graph: &Graph) -> Option<DisabledReason> {
        None
    }

    fn transitionable(&self) -> bool {
        false
    }

    /// Get a debug name for this action
    fn name(&self) -> &'static str;

    /// [`Action::apply`], refusing with [`EditError::Disabled`] first
    fn apply_checked(&self, graph: &Graph, progress: f64) -> Result<Graph, EditError> {
        if let Some(reason) = self.disabled(graph) {
            return Err(EditError::Disabled(reason));
        }
        self.apply(graph, progress)
    }
}

impl<A: Action + ?Sized> Action for Box<A> {
    fn apply(&self, graph: &Graph, progress: f64) -> Result<Graph, EditError> {
        (**self).apply(graph, progress)
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        (**self).disabled(graph)
    }

    fn transitionable(&self) -> bool {
        (**self).transitionable()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<A: Action + ?Sized> Action for Arc<A> {
    fn apply(&self, graph: &Graph, progress: f64) -> Result<Graph, EditError> {
        (**self).apply(graph, progress)
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        (**self).disabled(graph)
    }

    fn transitionable(&self) -> bool {
        (**self).transitionable()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Clamp a progress value into `0..=1`; NaN counts as finished
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        1.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

type Precondition = Box<dyn Fn(&Graph) -> Option<DisabledReason> + Send + Sync>;

/// A closure lifted into an [`Action`]
pub struct ActionFn<F> {
    name: &'static str,
    f: F,
    precondition: Option<Precondition>,
    transitionable: bool,
}

impl<F> ActionFn<F>
where
    F: Fn(&Graph, f64) -> Result<Graph, EditError> + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self {
            name,
            f,
            precondition: None,
            transitionable: false,
        }
    }

    pub fn with_precondition(
        mut self,
        precondition: impl Fn(&Graph) -> Option<DisabledReason> + Send + Sync + 'static,
    ) -> Self {
        self.precondition = Some(Box::new(precondition));
        self
    }

    /// Mark the closure as accepting eased progress
    pub fn transitionable(mut self) -> Self {
        self.transitionable = true;
        self
    }
}

impl<F> Action for ActionFn<F>
where
    F: Fn(&Graph, f64) -> Result<Graph, EditError> + Send + Sync,
{
    fn apply(&self, graph: &Graph, progress: f64) -> Result<Graph, EditError> {
        let progress = if self.transitionable { clamp_progress(progress) } else { 1.0 };
        (self.f)(graph, progress)
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        self.precondition.as_ref().and_then(|p| p(graph))
    }

    fn transitionable(&self) -> bool {
        self.transitionable
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl<F> fmt::Debug for ActionFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionFn")
            .field("name", &self.name)
            .field("transitionable", &self.transitionable)
            .finish_non_exhaustive()
    }
}

/// Several actions applied in order as one
#[derive(Default)]
pub struct Chain {
    actions: Vec<Box<dyn Action>>,
}

impl Chain {
    pub fn new(actions: Vec<Box<dyn Action>>) -> Self {
        Self { actions }
    }

    pub fn then(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Action for Chain {
    fn apply(&self, graph: &Graph, progress: f64) -> Result<Graph, EditError> {
        let mut graph = graph.clone();
        for action in &self.actions {
            graph = action.apply(&graph, progress)?;
        }
        Ok(graph)
    }

    /// The first member that is disabled against the graph its predecessors produce
    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        let mut graph = graph.clone();
        for action in &self.actions {
            if let Some(reason) = action.disabled(&graph) {
                return Some(reason);
            }
            graph = action.apply(&graph, 1.0).ok()?;
        }
        None
    }

    fn transitionable(&self) -> bool {
        self.actions.iter().any(|a| a.transitionable())
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.actions.iter().map(|a| a.name())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapedit_osm::{Entity, EntityId, Node};

    fn add_node(n: i64) -> ActionFn<impl Fn(&Graph, f64) -> Result<Graph, EditError> + Send + Sync> {
        ActionFn::new("add_node", move |graph: &Graph, _| {
            Ok(graph.replace(Entity::from(Node::new(EntityId::node(n), [0.0, 0.0]))))
        })
    }

    #[test]
    fn test_action_fn_applies_closure() {
        let graph = add_node(1).apply(&Graph::new(), 1.0).unwrap();
        assert!(graph.has_entity(EntityId::node(1)).is_some());
    }

    #[test]
    fn test_non_transitionable_ignores_progress() {
        let seen = ActionFn::new("progress", |graph: &Graph, t| {
            assert_eq!(t, 1.0);
            Ok(graph.clone())
        });
        seen.apply(&Graph::new(), 0.25).unwrap();
    }

    #[test]
    fn test_transitionable_clamps_progress() {
        let seen = ActionFn::new("progress", |graph: &Graph, t| {
            assert!((0.0..=1.0).contains(&t));
            Ok(graph.clone())
        })
        .transitionable();
        seen.apply(&Graph::new(), 7.0).unwrap();
        seen.apply(&Graph::new(), -3.0).unwrap();
        assert!(Action::transitionable(&seen));
    }

    #[test]
    fn test_apply_checked_respects_precondition() {
        let action = add_node(1).with_precondition(|_| Some(DisabledReason::NotEligible));
        assert_eq!(
            action.apply_checked(&Graph::new(), 1.0),
            Err(EditError::Disabled(DisabledReason::NotEligible))
        );
        assert!(action.apply(&Graph::new(), 1.0).is_ok());
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = Chain::default().then(add_node(1)).then(add_node(2));
        let graph = chain.apply(&Graph::new(), 1.0).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(graph.has_entity(EntityId::node(1)).is_some());
        assert!(graph.has_entity(EntityId::node(2)).is_some());
    }

    #[test]
    fn test_chain_disabled_sees_intermediate_graph() {
        let needs_node = ActionFn::new("noop", |graph: &Graph, _| Ok(graph.clone())).with_precondition(|graph| {
            graph
                .has_entity(EntityId::node(1))
                .is_none()
                .then_some(DisabledReason::NotFound)
        });
        let chain = Chain::default().then(add_node(1)).then(needs_node);
        assert_eq!(chain.disabled(&Graph::new()), None);
    }
}
