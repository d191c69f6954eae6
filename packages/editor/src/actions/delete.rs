//! Deleting entities and cleaning up what they leave behind.
//!
//! Removing an entity also removes it from every parent. A parent that
//! becomes degenerate in the process is deleted too, and children that end up
//! unreferenced and carry no interesting tags go with it. A shared visited set
//! keeps a relation that (transitively) contains itself from recursing forever.

use std::collections::HashSet;

use mapedit_graph::Graph;
use mapedit_osm::{Entity, EntityId, EntityKind};
use tracing::debug;

use crate::{Action, DisabledReason, EditError};

#[derive(Debug, Clone, Copy)]
pub struct DeleteNode(pub EntityId);

#[derive(Debug, Clone, Copy)]
pub struct DeleteWay(pub EntityId);

#[derive(Debug, Clone, Copy)]
pub struct DeleteRelation(pub EntityId);

#[derive(Debug, Clone, Default)]
pub struct DeleteMultiple(pub Vec<EntityId>);

impl Action for DeleteNode {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        graph.entity(self.0)?.node()?;
        graph.try_update(|graph| delete_node(graph, self.0, &mut HashSet::new()))
    }

    fn name(&self) -> &'static str {
        "delete_node"
    }
}

impl Action for DeleteWay {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        graph.entity(self.0)?.way()?;
        graph.try_update(|graph| delete_way(graph, self.0, &mut HashSet::new()))
    }

    fn name(&self) -> &'static str {
        "delete_way"
    }
}

impl Action for DeleteRelation {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        graph.entity(self.0)?.relation()?;
        graph.try_update(|graph| delete_relation(graph, self.0, &mut HashSet::new()))
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        let Some(relation) = graph.has_entity(self.0) else {
            return Some(DisabledReason::NotFound);
        };
        (!graph.is_complete(relation)).then_some(DisabledReason::IncompleteRelation)
    }

    fn name(&self) -> &'static str {
        "delete_relation"
    }
}

impl Action for DeleteMultiple {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        graph.try_update(|graph| -> Result<(), EditError> {
            let mut visited = HashSet::new();
            for id in &self.0 {
                delete_any(graph, *id, &mut visited)?;
            }
            Ok(())
        })
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        self.0
            .iter()
            .filter(|id| id.kind() == EntityKind::Relation)
            .find_map(|id| DeleteRelation(*id).disabled(graph).filter(|r| *r != DisabledReason::NotFound))
    }

    fn name(&self) -> &'static str {
        "delete_multiple"
    }
}

/// Delete whatever `id` is; absent ids are skipped
fn delete_any(graph: &mut Graph, id: EntityId, visited: &mut HashSet<EntityId>) -> Result<(), EditError> {
    if graph.has_entity(id).is_none() {
        return Ok(());
    }
    match id.kind() {
        EntityKind::Node => delete_node(graph, id, visited),
        EntityKind::Way => delete_way(graph, id, visited),
        EntityKind::Relation => delete_relation(graph, id, visited),
    }
}

/// Take `id` out of every parent relation, deleting parents that become degenerate
fn detach_from_relations(graph: &mut Graph, id: EntityId, visited: &mut HashSet<EntityId>) -> Result<(), EditError> {
    for parent_id in graph.parent_relation_ids(id) {
        if visited.contains(&parent_id) {
            continue;
        }
        let Some(parent) = graph.has_entity(parent_id) else {
            continue;
        };
        let parent = parent.relation()?.remove_members_with_id(id);
        let degenerate = parent.is_degenerate();
        graph.replace_mut(Entity::from(parent));
        if degenerate {
            delete_relation(graph, parent_id, visited)?;
        }
    }
    Ok(())
}

fn delete_node(graph: &mut Graph, id: EntityId, visited: &mut HashSet<EntityId>) -> Result<(), EditError> {
    if !visited.insert(id) {
        return Ok(());
    }

    for parent_id in graph.parent_way_ids(id) {
        if visited.contains(&parent_id) {
            continue;
        }
        let Some(parent) = graph.has_entity(parent_id) else {
            continue;
        };
        let parent = parent.way()?.remove_node(id)?;
        let degenerate = parent.is_degenerate();
        graph.replace_mut(Entity::from(parent));
        if degenerate {
            delete_way(graph, parent_id, visited)?;
        }
    }
    detach_from_relations(graph, id, visited)?;

    debug!(node = %id, "Deleting node");
    graph.remove_mut(id);
    Ok(())
}

fn delete_way(graph: &mut Graph, id: EntityId, visited: &mut HashSet<EntityId>) -> Result<(), EditError> {
    if !visited.insert(id) {
        return Ok(());
    }
    let way = graph.entity(id)?.way()?.clone();

    detach_from_relations(graph, id, visited)?;
    debug!(way = %id, "Deleting way");
    graph.remove_mut(id);

    for node_id in way.unique_nodes() {
        if visited.contains(&node_id) {
            continue;
        }
        if is_orphan(graph, node_id) {
            visited.insert(node_id);
            graph.remove_mut(node_id);
        }
    }
    Ok(())
}

fn delete_relation(graph: &mut Graph, id: EntityId, visited: &mut HashSet<EntityId>) -> Result<(), EditError> {
    if !visited.insert(id) {
        return Ok(());
    }
    let relation = graph.entity(id)?.relation()?.clone();

    detach_from_relations(graph, id, visited)?;
    debug!(relation = %id, members = relation.members.len(), "Deleting relation");
    graph.remove_mut(id);

    let mut seen = HashSet::new();
    for member in relation.member_ids() {
        if !seen.insert(member) || visited.contains(&member) {
            continue;
        }
        if is_orphan(graph, member) {
            delete_any(graph, member, visited)?;
        }
    }
    Ok(())
}

/// Present, without parents, and without interesting tags
fn is_orphan(graph: &Graph, id: EntityId) -> bool {
    let Some(entity) = graph.has_entity(id) else {
        return false;
    };
    graph.parent_ways(id).is_empty() && graph.parent_relations(id).is_empty() && !entity.has_interesting_tags()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapedit_osm::{tags, Member, Node, Relation, Way};

    fn n(id: i64, lon: f64) -> Entity {
        Node::new(EntityId::node(id), [lon, 0.0]).into()
    }

    fn w(id: i64, nodes: &[i64]) -> Entity {
        Way::new(EntityId::way(id), nodes.iter().map(|n| EntityId::node(*n)).collect()).into()
    }

    fn r(id: i64, members: &[EntityId]) -> Entity {
        Relation::new(
            EntityId::relation(id),
            members.iter().map(|m| Member::new(*m, "")).collect(),
        )
        .into()
    }

    #[test]
    fn test_delete_node_removes_from_ways() {
        let graph = Graph::from_base([n(1, 0.0), n(2, 1.0), n(3, 2.0), w(1, &[1, 2, 3])]);
        let graph = DeleteNode(EntityId::node(2)).apply(&graph, 1.0).unwrap();

        assert!(graph.has_entity(EntityId::node(2)).is_none());
        let way = graph.entity(EntityId::way(1)).unwrap().way().unwrap();
        assert_eq!(way.nodes, vec![EntityId::node(1), EntityId::node(3)]);
    }

    #[test]
    fn test_delete_node_deletes_degenerate_way() {
        let graph = Graph::from_base([n(1, 0.0), n(2, 1.0), w(1, &[1, 2])]);
        let graph = DeleteNode(EntityId::node(1)).apply(&graph, 1.0).unwrap();

        assert!(graph.has_entity(EntityId::way(1)).is_none());
        // untagged and now unreferenced
        assert!(graph.has_entity(EntityId::node(2)).is_none());
    }

    #[test]
    fn test_delete_way_keeps_shared_and_tagged_nodes() {
        let tagged: Entity = Node::new(EntityId::node(3), [2.0, 0.0])
            .with_tags(tags([("highway", "crossing")]))
            .into();
        let graph = Graph::from_base([n(1, 0.0), n(2, 1.0), tagged, w(1, &[1, 2, 3]), w(2, &[2, 4])]);
        let graph = DeleteWay(EntityId::way(1)).apply(&graph, 1.0).unwrap();

        assert!(graph.has_entity(EntityId::way(1)).is_none());
        assert!(graph.has_entity(EntityId::node(1)).is_none());
        assert!(graph.has_entity(EntityId::node(2)).is_some());
        assert!(graph.has_entity(EntityId::node(3)).is_some());
    }

    #[test]
    fn test_delete_relation_clears_parent_indices() {
        let graph = Graph::from_base([
            n(1, 0.0),
            n(2, 1.0),
            w(1, &[1, 2]),
            r(1, &[EntityId::way(1), EntityId::node(1)]),
        ]);
        assert_eq!(graph.parent_relation_ids(EntityId::way(1)), vec![EntityId::relation(1)]);

        let graph = DeleteRelation(EntityId::relation(1)).apply(&graph, 1.0).unwrap();
        assert!(graph.has_entity(EntityId::relation(1)).is_none());
        assert!(graph.parent_relation_ids(EntityId::way(1)).is_empty());
        assert!(graph.parent_relation_ids(EntityId::node(1)).is_empty());
        // the untagged way had no other parent
        assert!(graph.has_entity(EntityId::way(1)).is_none());
    }

    #[test]
    fn test_delete_relation_disabled_when_incomplete() {
        let graph = Graph::from_base([n(1, 0.0), r(1, &[EntityId::node(1), EntityId::way(9)])]);
        let action = DeleteRelation(EntityId::relation(1));
        assert_eq!(action.disabled(&graph), Some(DisabledReason::IncompleteRelation));
        assert_eq!(
            DeleteMultiple(vec![EntityId::relation(1)]).disabled(&graph),
            Some(DisabledReason::IncompleteRelation)
        );
    }

    #[test]
    fn test_delete_self_referencing_relation() {
        let graph = Graph::from_base([n(1, 0.0), r(1, &[EntityId::node(1), EntityId::relation(1)])]);
        let graph = DeleteRelation(EntityId::relation(1)).apply(&graph, 1.0).unwrap();
        assert!(graph.has_entity(EntityId::relation(1)).is_none());
        assert!(graph.has_entity(EntityId::node(1)).is_none());
    }

    #[test]
    fn test_delete_mutually_nested_relations() {
        let graph = Graph::from_base([
            r(1, &[EntityId::relation(2)]),
            r(2, &[EntityId::relation(1)]),
        ]);
        let graph = DeleteRelation(EntityId::relation(1)).apply(&graph, 1.0).unwrap();
        assert!(graph.has_entity(EntityId::relation(1)).is_none());
        assert!(graph.has_entity(EntityId::relation(2)).is_none());
    }

    #[test]
    fn test_delete_multiple_skips_missing() {
        let graph = Graph::from_base([n(1, 0.0), n(2, 1.0)]);
        let action = DeleteMultiple(vec![EntityId::node(1), EntityId::node(7), EntityId::node(2)]);
        let graph = action.apply(&graph, 1.0).unwrap();
        assert_eq!(graph.entities().count(), 0);
    }
}
