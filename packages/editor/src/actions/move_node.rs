use mapedit_graph::Graph;
use mapedit_osm::{Entity, EntityId, Loc};

use crate::action::clamp_progress;
use crate::{Action, DisabledReason, EditError};

/// Move a node toward `to`; at progress `t` the node sits at
/// `interp(original, to, t)`, where `original` is its location in the graph
/// the action is applied to
#[derive(Debug, Clone, Copy)]
pub struct MoveNode {
    pub id: EntityId,
    pub to: Loc,
}

impl MoveNode {
    pub fn new(id: EntityId, to: impl Into<Loc>) -> Self {
        Self { id, to: to.into() }
    }
}

impl Action for MoveNode {
    fn apply(&self, graph: &Graph, progress: f64) -> Result<Graph, EditError> {
        let node = graph.entity(self.id)?.node()?;
        let loc = Loc::interp(node.loc, self.to, clamp_progress(progress));
        Ok(graph.replace(Entity::from(node.move_to(loc))))
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        match graph.has_entity(self.id) {
            None => Some(DisabledReason::NotFound),
            Some(entity) if entity.as_node().is_none() => Some(DisabledReason::NotEligible),
            Some(_) => None,
        }
    }

    fn transitionable(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "move_node"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapedit_osm::Node;

    fn loc_of(graph: &Graph, id: EntityId) -> Loc {
        graph.entity(id).unwrap().as_node().unwrap().loc
    }

    #[test]
    fn test_progress_endpoints() {
        let graph = Graph::from_base([Node::new(EntityId::node(1), [0.0, 0.0]).into()]);
        let action = MoveNode::new(EntityId::node(1), [2.0, 3.0]);

        let start = action.apply(&graph, 0.0).unwrap();
        assert!(!loc_of(&start, EntityId::node(1)).differs_from(&Loc::new(0.0, 0.0), 1e-12));

        let end = action.apply(&graph, 1.0).unwrap();
        assert!(!loc_of(&end, EntityId::node(1)).differs_from(&Loc::new(2.0, 3.0), 1e-12));
    }

    #[test]
    fn test_halfway() {
        let graph = Graph::from_base([Node::new(EntityId::node(1), [0.0, 0.0]).into()]);
        let moved = MoveNode::new(EntityId::node(1), [2.0, 4.0]).apply(&graph, 0.5).unwrap();
        assert_eq!(loc_of(&moved, EntityId::node(1)), Loc::new(1.0, 2.0));
    }

    #[test]
    fn test_same_input_same_output() {
        let graph = Graph::from_base([Node::new(EntityId::node(1), [0.0, 0.0]).into()]);
        let action = MoveNode::new(EntityId::node(1), [1.0, 1.0]);
        assert_eq!(action.apply(&graph, 0.3).unwrap(), action.apply(&graph, 0.3).unwrap());
    }

    #[test]
    fn test_moving_a_way_is_disabled() {
        let graph = Graph::from_base([mapedit_osm::Way::new(EntityId::way(1), Vec::new()).into()]);
        let action = MoveNode::new(EntityId::way(1), [1.0, 1.0]);
        assert_eq!(action.disabled(&graph), Some(DisabledReason::NotEligible));
        assert!(action.apply(&graph, 1.0).is_err());
    }
}
