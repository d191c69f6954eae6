//! Deep copy of entities under fresh ids.

use std::collections::HashMap;

use mapedit_osm::{Entity, EntityId, Member, Node, Relation, Way};
use tracing::debug;

use crate::{Graph, GraphError};

/// Copy `ids` and everything they reference into `graph` under new ids
///
/// Way nodes and loaded relation members are copied recursively. Each source
/// entity is copied at most once, so shared nodes stay shared and a relation
/// cycle maps onto a cycle between the copies. Relation members that are not
/// loaded keep their original id.
///
/// Returns the new graph and the ids of the copies of `ids`, in order.
pub fn copy_entities(graph: &Graph, ids: &[EntityId]) -> Result<(Graph, Vec<EntityId>), GraphError> {
    let mut copies: HashMap<EntityId, EntityId> = HashMap::new();
    let mut target = graph.clone();

    let roots = ids
        .iter()
        .map(|id| copy_entity(graph, &mut target, *id, &mut copies))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(roots = roots.len(), copied = copies.len(), "Copied entities");
    Ok((target, roots))
}

fn copy_entity(
    source: &Graph,
    target: &mut Graph,
    id: EntityId,
    copies: &mut HashMap<EntityId, EntityId>,
) -> Result<EntityId, GraphError> {
    if let Some(copy) = copies.get(&id) {
        return Ok(*copy);
    }

    let entity = source.entity(id)?.clone();
    let new_id = target.allocate_id(id.kind());
    // registered before recursing so a cycle resolves to this copy
    copies.insert(id, new_id);

    let copy: Entity = match entity.as_ref() {
        Entity::Node(node) => Node::new(new_id, node.loc).with_tags(node.tags.clone()).into(),
        Entity::Way(way) => {
            let nodes = way
                .nodes
                .iter()
                .map(|node| copy_entity(source, target, *node, copies))
                .collect::<Result<Vec<_>, _>>()?;
            Way::new(new_id, nodes).with_tags(way.tags.clone()).into()
        }
        Entity::Relation(relation) => {
            let mut members = Vec::with_capacity(relation.members.len());
            for member in &relation.members {
                let id = if source.has_entity(member.id).is_some() {
                    copy_entity(source, target, member.id, copies)?
                } else {
                    member.id
                };
                members.push(Member::new(id, member.role.clone()));
            }
            Relation::new(new_id, members).with_tags(relation.tags.clone()).into()
        }
    };

    target.replace_mut(copy);
    Ok(new_id)
}
