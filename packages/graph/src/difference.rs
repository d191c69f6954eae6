//! # Difference
//!
//! What changed between two snapshots of the same lineage.
//!
//! Only local layers are compared: two graphs that share a base differ
//! exactly where one of them overrides an entity. [`Difference::complete`]
//! widens the change set to everything that needs re-deriving (way nodes,
//! multipolygon members, and every ancestor through parent ways/relations).

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use mapedit_osm::{Entity, EntityId};
use serde::Serialize;

use crate::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Created(Arc<Entity>),
    Modified { base: Arc<Entity>, head: Arc<Entity> },
    Deleted(Arc<Entity>),
}

impl Change {
    pub fn id(&self) -> EntityId {
        self.entity().id()
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Created(_) => ChangeKind::Created,
            Change::Modified { .. } => ChangeKind::Modified,
            Change::Deleted(_) => ChangeKind::Deleted,
        }
    }

    /// The value before the change
    pub fn base(&self) -> Option<&Arc<Entity>> {
        match self {
            Change::Created(_) => None,
            Change::Modified { base, .. } => Some(base),
            Change::Deleted(base) => Some(base),
        }
    }

    /// The value after the change
    pub fn head(&self) -> Option<&Arc<Entity>> {
        match self {
            Change::Created(head) => Some(head),
            Change::Modified { head, .. } => Some(head),
            Change::Deleted(_) => None,
        }
    }

    /// Head if present, otherwise base
    pub fn entity(&self) -> &Arc<Entity> {
        match self {
            Change::Created(head) | Change::Modified { head, .. } => head,
            Change::Deleted(base) => base,
        }
    }
}

/// One line of a user-facing change list
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    pub id: EntityId,
    pub kind: ChangeKind,
    pub entity: Arc<Entity>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeCounts {
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone)]
pub struct Difference {
    from: Graph,
    to: Graph,
    changes: BTreeMap<EntityId, Change>,
}

impl Difference {
    /// Changes that turn `from` into `to`
    pub fn between(from: &Graph, to: &Graph) -> Self {
        let mut changes = BTreeMap::new();

        if !from.ptr_eq(to) {
            let ids: BTreeSet<EntityId> = from.local_ids().chain(to.local_ids()).collect();
            for id in ids {
                let change = match (from.has_entity(id), to.has_entity(id)) {
                    (None, None) => continue,
                    (Some(base), Some(head)) if Arc::ptr_eq(base, head) || base == head => continue,
                    (Some(base), Some(head)) => Change::Modified {
                        base: base.clone(),
                        head: head.clone(),
                    },
                    (None, Some(head)) => Change::Created(head.clone()),
                    (Some(base), None) => Change::Deleted(base.clone()),
                };
                changes.insert(id, change);
            }
        }

        Self {
            from: from.clone(),
            to: to.clone(),
            changes,
        }
    }

    pub fn from_graph(&self) -> &Graph {
        &self.from
    }

    pub fn to_graph(&self) -> &Graph {
        &self.to
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, id: EntityId) -> Option<&Change> {
        self.changes.get(&id)
    }

    /// Changes in id order
    pub fn changes(&self) -> impl Iterator<Item = &Change> + '_ {
        self.changes.values()
    }

    pub fn created(&self) -> Vec<&Arc<Entity>> {
        self.of_kind(ChangeKind::Created)
    }

    pub fn modified(&self) -> Vec<&Arc<Entity>> {
        self.of_kind(ChangeKind::Modified)
    }

    /// Deleted entities, as they were before deletion
    pub fn deleted(&self) -> Vec<&Arc<Entity>> {
        self.of_kind(ChangeKind::Deleted)
    }

    fn of_kind(&self, kind: ChangeKind) -> Vec<&Arc<Entity>> {
        self.changes
            .values()
            .filter(|c| c.kind() == kind)
            .map(Change::entity)
            .collect()
    }

    pub fn counts(&self) -> ChangeCounts {
        let mut counts = ChangeCounts::default();
        for change in self.changes.values() {
            match change.kind() {
                ChangeKind::Created => counts.created += 1,
                ChangeKind::Modified => counts.modified += 1,
                ChangeKind::Deleted => counts.deleted += 1,
            }
        }
        counts
    }

    /// Every entity affected by the change, mapped to its value in the newer
    /// graph (`None` when it is gone)
    pub fn complete(&self) -> BTreeMap<EntityId, Option<Arc<Entity>>> {
        let mut result = BTreeMap::new();
        let mut stack: Vec<EntityId> = Vec::new();

        for (id, change) in &self.changes {
            result.insert(*id, change.head().cloned());
            stack.push(*id);

            // Way nodes are listed even when missing; multipolygon members only when loaded
            let keep_missing = match change.entity().as_ref() {
                Entity::Way(_) => true,
                Entity::Relation(relation) if relation.is_multipolygon() => false,
                _ => continue,
            };

            let children: BTreeSet<EntityId> = change
                .head()
                .into_iter()
                .chain(change.base())
                .flat_map(|e| e.child_ids())
                .collect();
            for child in children {
                let value = self.to.has_entity(child).cloned();
                if value.is_some() || keep_missing {
                    result.insert(child, value);
                }
            }
        }

        // Ancestors in either graph
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            for graph in [&self.to, &self.from] {
                let parents = graph.parent_way_ids(id).into_iter().chain(graph.parent_relation_ids(id));
                for parent in parents {
                    result
                        .entry(parent)
                        .or_insert_with(|| self.to.has_entity(parent).cloned());
                    stack.push(parent);
                }
            }
        }

        result
    }

    /// User-facing change list
    ///
    /// Vertices (nodes that belong to a way) are folded into their parent
    /// ways: moving a vertex reports the way as modified, and the vertex is
    /// only listed itself when its tags changed or are interesting.
    pub fn summary(&self) -> Vec<SummaryEntry> {
        let mut result: BTreeMap<EntityId, SummaryEntry> = BTreeMap::new();

        for change in self.changes.values() {
            let head = change.head();
            let base = change.base();

            if let Some(head) = head.filter(|h| !is_vertex(&self.to, h)) {
                let kind = if base.is_some() {
                    ChangeKind::Modified
                } else {
                    ChangeKind::Created
                };
                add_summary(&mut result, head, kind);
            } else if let Some(base) = base.filter(|b| !is_vertex(&self.from, b)) {
                add_summary(&mut result, base, ChangeKind::Deleted);
            } else if let (Some(base), Some(head)) = (base, head) {
                let moved = base.as_node().map(|n| n.loc) != head.as_node().map(|n| n.loc);
                let retagged = base.tags() != head.tags();
                if moved {
                    for parent in self.to.parent_ways(head.id()) {
                        if !result.contains_key(&parent.id()) {
                            add_summary(&mut result, parent, ChangeKind::Modified);
                        }
                    }
                }
                if retagged || (moved && head.has_interesting_tags()) {
                    add_summary(&mut result, head, ChangeKind::Modified);
                }
            } else if let Some(head) = head.filter(|h| h.has_interesting_tags()) {
                add_summary(&mut result, head, ChangeKind::Created);
            } else if let Some(base) = base.filter(|b| b.has_interesting_tags()) {
                add_summary(&mut result, base, ChangeKind::Deleted);
            }
        }

        result.into_values().collect()
    }
}

fn is_vertex(graph: &Graph, entity: &Entity) -> bool {
    matches!(entity, Entity::Node(_)) && !graph.is_poi(entity.id())
}

fn add_summary(result: &mut BTreeMap<EntityId, SummaryEntry>, entity: &Arc<Entity>, kind: ChangeKind) {
    result.insert(
        entity.id(),
        SummaryEntry {
            id: entity.id(),
            kind,
            entity: entity.clone(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapedit_osm::{tags, Loc, Member, Node, Relation, Way};

    fn base_graph() -> Graph {
        Graph::from_base([
            Node::new(EntityId::node(1), [0.0, 0.0]).into(),
            Node::new(EntityId::node(2), [1.0, 0.0]).into(),
            Way::new(EntityId::way(1), vec![EntityId::node(1), EntityId::node(2)]).into(),
            Relation::new(EntityId::relation(1), vec![Member::new(EntityId::way(1), "")]).into(),
        ])
    }

    fn moved(graph: &Graph, id: EntityId, loc: Loc) -> Entity {
        let node = graph.entity(id).unwrap().node().unwrap().move_to(loc);
        node.into()
    }

    #[test]
    fn test_same_graph_has_no_changes() {
        let graph = base_graph();
        assert!(Difference::between(&graph, &graph).is_empty());
        assert!(Difference::between(&graph, &graph.clone()).is_empty());
    }

    #[test]
    fn test_classifies_changes() {
        let from = base_graph();
        let to = from
            .replace(moved(&from, EntityId::node(1), Loc::new(0.5, 0.5)))
            .replace(Entity::from(Node::new(EntityId::node(-1), [3.0, 3.0])))
            .remove(EntityId::relation(1));

        let diff = Difference::between(&from, &to);
        assert_eq!(diff.len(), 3);
        assert_eq!(diff.get(EntityId::node(1)).map(Change::kind), Some(ChangeKind::Modified));
        assert_eq!(diff.get(EntityId::node(-1)).map(Change::kind), Some(ChangeKind::Created));
        assert_eq!(diff.get(EntityId::relation(1)).map(Change::kind), Some(ChangeKind::Deleted));
        assert_eq!(
            diff.counts(),
            ChangeCounts {
                created: 1,
                modified: 1,
                deleted: 1
            }
        );
    }

    #[test]
    fn test_difference_is_symmetric_in_ids() {
        let from = base_graph();
        let to = from.remove(EntityId::node(2));
        let forward = Difference::between(&from, &to);
        let back = Difference::between(&to, &from);

        assert_eq!(forward.deleted().len(), 1);
        assert_eq!(back.created().len(), 1);
        assert_eq!(back.created()[0].id(), EntityId::node(2));
    }

    #[test]
    fn test_complete_reaches_ancestors() {
        let from = base_graph();
        let to = from.replace(moved(&from, EntityId::node(1), Loc::new(0.5, 0.5)));

        let complete = Difference::between(&from, &to).complete();
        let ids: Vec<EntityId> = complete.keys().copied().collect();
        assert_eq!(ids, vec![EntityId::node(1), EntityId::way(1), EntityId::relation(1)]);
    }

    #[test]
    fn test_complete_terminates_on_cycles() {
        let r1 = EntityId::relation(1);
        let r2 = EntityId::relation(2);
        let from = Graph::from_base([
            Node::new(EntityId::node(1), [0.0, 0.0]).into(),
            Relation::new(r1, vec![Member::new(EntityId::node(1), ""), Member::new(r2, "")]).into(),
            Relation::new(r2, vec![Member::new(r1, "")]).into(),
        ]);
        let to = from.replace(moved(&from, EntityId::node(1), Loc::new(1.0, 1.0)));

        let complete = Difference::between(&from, &to).complete();
        assert!(complete.contains_key(&r1));
        assert!(complete.contains_key(&r2));
    }

    #[test]
    fn test_summary_folds_vertices_into_ways() {
        let from = base_graph();
        let to = from.replace(moved(&from, EntityId::node(1), Loc::new(0.5, 0.5)));

        let summary = Difference::between(&from, &to).summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].id, EntityId::way(1));
        assert_eq!(summary[0].kind, ChangeKind::Modified);

        let retagged = to.replace(
            to.entity(EntityId::node(2))
                .unwrap()
                .with_new_tags(tags([("highway", "crossing")])),
        );
        let summary = Difference::between(&from, &retagged).summary();
        let ids: Vec<EntityId> = summary.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![EntityId::node(2), EntityId::way(1)]);
    }
}
