use std::sync::Arc;

use mapedit_graph::Graph;
use mapedit_osm::{Entity, EntityId, Node};
use tracing::debug;

use crate::{Action, DisabledReason, EditError};

/// Insert `node` between the edge `a → b` of every way that has that edge
///
/// The edge matches in either direction. Each way gets one insertion, after
/// the first occurrence of the edge, so a closed loop `[a, b, a]` becomes
/// `[a, c, b, a]`.
#[derive(Debug, Clone)]
pub struct AddMidpoint {
    pub edge: (EntityId, EntityId),
    pub node: Arc<Node>,
}

impl AddMidpoint {
    pub fn new(edge: (EntityId, EntityId), node: Node) -> Self {
        Self {
            edge,
            node: Arc::new(node),
        }
    }
}

impl Action for AddMidpoint {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        let (a, b) = self.edge;
        let node_id = self.node.id;

        graph.try_update(|graph| -> Result<(), EditError> {
            graph.replace_mut(Entity::from(Node::clone(&self.node)));

            let shared: Vec<EntityId> = graph
                .parent_way_ids(a)
                .into_iter()
                .filter(|way| graph.parent_way_ids(b).contains(way))
                .collect();

            for way_id in shared {
                let way = graph.entity(way_id)?.way()?.clone();
                let position = way
                    .nodes
                    .windows(2)
                    .position(|pair| (pair[0] == a && pair[1] == b) || (pair[0] == b && pair[1] == a));
                if let Some(i) = position {
                    debug!(way = %way_id, index = i + 1, "Inserting midpoint");
                    graph.replace_mut(Entity::from(way.add_node(node_id, Some(i + 1))?));
                }
            }
            Ok(())
        })
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        let (a, b) = self.edge;
        if graph.has_entity(a).is_none() || graph.has_entity(b).is_none() {
            return Some(DisabledReason::NotFound);
        }
        None
    }

    fn name(&self) -> &'static str {
        "add_midpoint"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapedit_osm::Way;

    fn loop_graph() -> Graph {
        Graph::from_base([
            Node::new(EntityId::node(1), [0.0, 0.0]).into(),
            Node::new(EntityId::node(2), [1.0, 0.0]).into(),
            Way::new(
                EntityId::way(1),
                vec![EntityId::node(1), EntityId::node(2), EntityId::node(1)],
            )
            .into(),
        ])
    }

    #[test]
    fn test_midpoint_in_closed_loop() {
        let graph = loop_graph();
        let c = Node::new(EntityId::node(-1), [0.5, 0.0]);
        let action = AddMidpoint::new((EntityId::node(1), EntityId::node(2)), c);

        let graph = action.apply(&graph, 1.0).unwrap();
        let way = graph.entity(EntityId::way(1)).unwrap().way().unwrap();
        assert_eq!(
            way.nodes,
            vec![EntityId::node(1), EntityId::node(-1), EntityId::node(2), EntityId::node(1)]
        );
    }

    #[test]
    fn test_reversed_edge_matches() {
        let graph = Graph::from_base([
            Node::new(EntityId::node(1), [0.0, 0.0]).into(),
            Node::new(EntityId::node(2), [1.0, 0.0]).into(),
            Way::new(EntityId::way(1), vec![EntityId::node(1), EntityId::node(2)]).into(),
        ]);
        let c = Node::new(EntityId::node(-1), [0.5, 0.0]);
        let action = AddMidpoint::new((EntityId::node(2), EntityId::node(1)), c);

        let graph = action.apply(&graph, 1.0).unwrap();
        let way = graph.entity(EntityId::way(1)).unwrap().way().unwrap();
        assert_eq!(way.nodes, vec![EntityId::node(1), EntityId::node(-1), EntityId::node(2)]);
        assert_eq!(graph.parent_way_ids(EntityId::node(-1)), vec![EntityId::way(1)]);
    }

    #[test]
    fn test_nodes_not_adjacent_only_adds_node() {
        let graph = Graph::from_base([
            Node::new(EntityId::node(1), [0.0, 0.0]).into(),
            Node::new(EntityId::node(2), [1.0, 0.0]).into(),
            Node::new(EntityId::node(3), [2.0, 0.0]).into(),
            Way::new(
                EntityId::way(1),
                vec![EntityId::node(1), EntityId::node(2), EntityId::node(3)],
            )
            .into(),
        ]);
        let c = Node::new(EntityId::node(-1), [1.0, 0.0]);
        let action = AddMidpoint::new((EntityId::node(1), EntityId::node(3)), c);

        let graph = action.apply(&graph, 1.0).unwrap();
        assert!(graph.has_entity(EntityId::node(-1)).is_some());
        assert_eq!(graph.entity(EntityId::way(1)).unwrap().way().unwrap().nodes.len(), 3);
    }
}
