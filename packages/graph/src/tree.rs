//! # Tree
//!
//! Spatial index that follows a lineage of graphs.
//!
//! The tree remembers the graph it last indexed (its head). Queries take the
//! caller's current graph; when that differs from the head, only the entities
//! in the local-layer difference and their ancestors are re-derived, so a drag
//! frame that moves one node costs one node, its ways, and their relations.
//!
//! Remote data enters through [`Tree::rebase`], which mirrors
//! [`Graph::rebase`] on the head so that entities whose members were missing
//! get their real bounding box once the members arrive.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use mapedit_osm::{Entity, EntityId, Extent};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::spatial::SpatialIndex;
use crate::{Difference, Graph};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeConfig {
    /// Grid cell edge, in degrees
    pub cell_size: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { cell_size: 0.01 }
    }
}

/// One edge of a way, `nodes.0 → nodes.1` at position `index`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub way: EntityId,
    pub index: usize,
    pub nodes: (EntityId, EntityId),
}

type SegmentKey = (EntityId, usize);

#[derive(Debug, Clone)]
pub struct Tree {
    head: Graph,
    entities: SpatialIndex<EntityId>,
    segments: SpatialIndex<SegmentKey>,
    way_segments: HashMap<EntityId, Vec<Segment>>,
}

impl Tree {
    pub fn new(graph: &Graph) -> Self {
        Self::with_config(graph, TreeConfig::default())
    }

    pub fn with_config(graph: &Graph, config: TreeConfig) -> Self {
        let mut tree = Self {
            head: graph.clone(),
            entities: SpatialIndex::new(config.cell_size),
            segments: SpatialIndex::new(config.cell_size),
            way_segments: HashMap::new(),
        };
        let ids: BTreeSet<EntityId> = graph.entities().map(|e| e.id()).collect();
        tree.load(ids);
        tree
    }

    /// The graph the index currently reflects
    pub fn head(&self) -> &Graph {
        &self.head
    }

    /// Number of tracked entities, including ones with no extent yet
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Load a remote batch
    ///
    /// The head graph is rebased with the same batch. Entities the head has
    /// edited locally are left alone, as are entities already indexed unless
    /// `force`. Local removals the rebase lifts are indexed again. Ancestors
    /// of every inserted entity are re-derived.
    #[instrument(skip_all, fields(entities = entities.len(), force))]
    pub fn rebase(&mut self, entities: &[Arc<Entity>], force: bool) {
        let tombstoned: Vec<EntityId> = self
            .head
            .local_entities()
            .filter(|(_, entity)| entity.is_none())
            .map(|(id, _)| id)
            .collect();
        self.head = self.head.rebased(entities, force);

        let mut to_update = BTreeSet::new();
        let mut seen = HashSet::new();
        for id in tombstoned {
            if self.head.has_entity(id).is_some() {
                to_update.insert(id);
                self.include_parents(id, &mut to_update, &mut seen);
            }
        }
        for entity in entities {
            if !entity.visible() {
                continue;
            }
            let id = entity.id();
            if self.head.is_locally_edited(id) {
                continue;
            }
            if self.entities.contains(id) && !force {
                continue;
            }

            to_update.insert(id);
            self.include_parents(id, &mut to_update, &mut seen);
        }

        debug!(rederived = to_update.len(), "Indexed rebased entities");
        self.load(to_update);
    }

    /// Entities of `graph` whose bounding box overlaps `extent`, sorted by id
    pub fn intersects(&mut self, extent: &Extent, graph: &Graph) -> Vec<Arc<Entity>> {
        self.set_head(graph);
        self.entities
            .query(extent)
            .into_iter()
            .filter_map(|id| graph.has_entity(id).cloned())
            .collect()
    }

    /// Way edges of `graph` whose bounding box overlaps `extent`
    pub fn way_segments(&mut self, extent: &Extent, graph: &Graph) -> Vec<Segment> {
        self.set_head(graph);
        self.segments
            .query(extent)
            .into_iter()
            .filter(|(way, _)| graph.has_entity(*way).is_some())
            .filter_map(|(way, index)| {
                self.way_segments
                    .get(&way)
                    .and_then(|segments| segments.iter().find(|s| s.index == index))
                    .copied()
            })
            .collect()
    }

    fn set_head(&mut self, graph: &Graph) {
        if self.head.ptr_eq(graph) {
            return;
        }

        let diff = Difference::between(&self.head, graph);
        self.head = graph.clone();
        if diff.is_empty() {
            return;
        }

        let mut to_update = BTreeSet::new();
        let mut seen = HashSet::new();
        for change in diff.changes() {
            let id = change.id();
            to_update.insert(id);
            self.include_parents(id, &mut to_update, &mut seen);
        }

        debug!(changed = diff.len(), rederived = to_update.len(), "Reconciled spatial index");
        self.load(to_update);
    }

    /// Add every ancestor of `id` in the head graph
    fn include_parents(&self, id: EntityId, to_update: &mut BTreeSet<EntityId>, seen: &mut HashSet<EntityId>) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let parents = self
                .head
                .parent_way_ids(id)
                .into_iter()
                .chain(self.head.parent_relation_ids(id));
            for parent in parents {
                to_update.insert(parent);
                stack.push(parent);
            }
        }
    }

    /// Re-derive `ids` from the head; ids the head no longer has are dropped
    fn load(&mut self, ids: BTreeSet<EntityId>) {
        for id in ids {
            self.remove_entity(id);

            let Some(entity) = self.head.has_entity(id).cloned() else {
                continue;
            };
            if !entity.visible() {
                continue;
            }

            let extent = self.head.extent(&entity);
            self.entities.insert(id, extent);

            if let Entity::Way(way) = entity.as_ref() {
                let mut segments = Vec::with_capacity(way.nodes.len().saturating_sub(1));
                for (index, pair) in way.nodes.windows(2).enumerate() {
                    let locs = (self.head.has_entity(pair[0]), self.head.has_entity(pair[1]));
                    let (Some(a), Some(b)) = locs else {
                        continue;
                    };
                    let (Some(a), Some(b)) = (a.as_node(), b.as_node()) else {
                        continue;
                    };

                    self.segments.insert((id, index), Extent::new(a.loc, b.loc));
                    segments.push(Segment {
                        way: id,
                        index,
                        nodes: (pair[0], pair[1]),
                    });
                }
                self.way_segments.insert(id, segments);
            }
        }
    }

    fn remove_entity(&mut self, id: EntityId) {
        self.entities.remove(id);
        if let Some(segments) = self.way_segments.remove(&id) {
            for segment in segments {
                self.segments.remove((id, segment.index));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapedit_osm::{Loc, Node, Way};

    #[test]
    fn test_new_indexes_existing_entities() {
        let graph = Graph::from_base([
            Node::new(EntityId::node(1), [1.0, 1.0]).into(),
            Node::new(EntityId::node(2), [5.0, 5.0]).into(),
        ]);
        let mut tree = Tree::new(&graph);

        assert_eq!(tree.len(), 2);
        let found = tree.intersects(&Extent::new([0.0, 0.0], [2.0, 2.0]), &graph);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), EntityId::node(1));
    }

    #[test]
    fn test_way_segments() {
        let graph = Graph::from_base([
            Node::new(EntityId::node(1), [0.0, 0.0]).into(),
            Node::new(EntityId::node(2), [1.0, 0.0]).into(),
            Node::new(EntityId::node(3), [1.0, 1.0]).into(),
            Way::new(EntityId::way(1), vec![EntityId::node(1), EntityId::node(2), EntityId::node(3)]).into(),
        ]);
        let mut tree = Tree::new(&graph);

        let segments = tree.way_segments(&Extent::from_point(Loc::new(1.0, 0.5)), &graph);
        assert_eq!(
            segments,
            vec![Segment {
                way: EntityId::way(1),
                index: 1,
                nodes: (EntityId::node(2), EntityId::node(3)),
            }]
        );

        let removed = graph.remove(EntityId::way(1));
        assert!(tree.way_segments(&Extent::new([-1.0, -1.0], [2.0, 2.0]), &removed).is_empty());
    }

    #[test]
    fn test_config_from_json() {
        let config: TreeConfig = serde_json::from_str(r#"{"cellSize": 0.5}"#).unwrap();
        assert_eq!(config.cell_size, 0.5);
        let config: TreeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TreeConfig::default());
    }
}
