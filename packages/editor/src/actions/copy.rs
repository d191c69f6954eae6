use std::collections::BTreeSet;

use mapedit_graph::{copy_entities, Graph};
use mapedit_osm::{Entity, EntityId, Loc};

use crate::{Action, DisabledReason, EditError};

/// Duplicate entities (with everything they reference) and shift the copies
#[derive(Debug, Clone)]
pub struct CopyEntities {
    pub ids: Vec<EntityId>,
    /// `[dlon, dlat]` applied to every copied node
    pub offset: [f64; 2],
}

impl CopyEntities {
    pub fn new(ids: Vec<EntityId>, offset: [f64; 2]) -> Self {
        Self { ids, offset }
    }

    /// Apply and also report the ids of the copies of `ids`, in order
    pub fn copy(&self, graph: &Graph) -> Result<(Graph, Vec<EntityId>), EditError> {
        let (mut graph, roots) = copy_entities(graph, &self.ids)?;

        if self.offset != [0.0, 0.0] {
            let nodes: BTreeSet<EntityId> = roots.iter().flat_map(|id| graph.descendant_node_ids(*id)).collect();
            for id in nodes {
                let node = graph.entity(id)?.node()?;
                let loc = Loc::new(node.loc.lon + self.offset[0], node.loc.lat + self.offset[1]);
                let moved = Entity::from(node.move_to(loc));
                graph.replace_mut(moved);
            }
        }
        Ok((graph, roots))
    }
}

impl Action for CopyEntities {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        self.copy(graph).map(|(graph, _)| graph)
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        if self.ids.iter().any(|id| graph.has_entity(*id).is_none()) {
            return Some(DisabledReason::NotFound);
        }
        let incomplete = self
            .ids
            .iter()
            .filter_map(|id| graph.has_entity(*id))
            .any(|entity| entity.as_way().is_some() && !graph.is_complete(entity));
        incomplete.then_some(DisabledReason::NotEligible)
    }

    fn name(&self) -> &'static str {
        "copy_entities"
    }
}
