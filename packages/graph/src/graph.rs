//! # Graph
//!
//! Immutable, versioned snapshot of every entity the editor knows about.
//!
//! ## Design
//!
//! - The **base layer** holds the last known remote state and its parent
//!   indices. It is shared by `Arc` across every snapshot of a session.
//! - The **local layer** holds this snapshot's overrides: edited entities,
//!   tombstones (`None`), and parent-index entries that differ from the base.
//! - Cloning a graph clones two `Arc`s. The first write through a clone copies
//!   only the local layer; the base is never copied by an edit.
//! - Parent indices (`node → ways`, `member → relations`) are a derived cache,
//!   updated for exactly the children an edit added or removed.
//!
//! ## Example
//!
//! ```rust
//! use mapedit_graph::Graph;
//! use mapedit_osm::{Entity, EntityId, Node, Way};
//!
//! let a = Node::new(EntityId::node(1), [0.0, 0.0]);
//! let b = Node::new(EntityId::node(2), [1.0, 1.0]);
//! let way = Way::new(EntityId::way(1), vec![a.id, b.id]);
//!
//! let graph = Graph::new()
//!     .replace(Entity::from(a))
//!     .replace(Entity::from(b))
//!     .replace(Entity::from(way));
//!
//! assert_eq!(graph.parent_way_ids(EntityId::node(1)), vec![EntityId::way(1)]);
//! assert!(Graph::new().has_entity(EntityId::way(1)).is_none());
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use mapedit_osm::{Entity, EntityId, EntityKind, Extent, NextIds, Node, Way};
use tracing::{debug, info, instrument};

use crate::GraphError;

pub type ParentIds = BTreeSet<EntityId>;

type ParentMap = HashMap<EntityId, ParentIds>;

/// `child → parents` for ways and relations
#[derive(Debug, Clone, Default)]
struct ParentIndex {
    ways: ParentMap,
    relations: ParentMap,
}

impl ParentIndex {
    fn map(&self, kind: EntityKind) -> Option<&ParentMap> {
        match kind {
            EntityKind::Way => Some(&self.ways),
            EntityKind::Relation => Some(&self.relations),
            EntityKind::Node => None,
        }
    }

    fn map_mut(&mut self, kind: EntityKind) -> Option<&mut ParentMap> {
        match kind {
            EntityKind::Way => Some(&mut self.ways),
            EntityKind::Relation => Some(&mut self.relations),
            EntityKind::Node => None,
        }
    }

    /// Record the links that changed when `previous` became `current`.
    /// Entries missing here start from `fallback`'s copy.
    fn apply_change(&mut self, fallback: Option<&ParentIndex>, previous: Option<&Entity>, current: Option<&Entity>) {
        let Some(entity) = current.or(previous) else {
            return;
        };
        let parent = entity.id();
        let kind = entity.kind();
        let Some(map) = self.map_mut(kind) else {
            return;
        };
        let fallback = fallback.and_then(|f| f.map(kind));

        let before: HashSet<EntityId> = previous.map(Entity::child_ids).unwrap_or_default().into_iter().collect();
        let after: Vec<EntityId> = current.map(Entity::child_ids).unwrap_or_default();
        let after_set: HashSet<EntityId> = after.iter().copied().collect();

        for child in before.iter().filter(|id| !after_set.contains(*id)) {
            parents_entry(map, fallback, *child).remove(&parent);
        }
        for child in after.iter().filter(|id| !before.contains(*id)) {
            parents_entry(map, fallback, *child).insert(parent);
        }
    }
}

fn parents_entry<'a>(map: &'a mut ParentMap, fallback: Option<&ParentMap>, child: EntityId) -> &'a mut ParentIds {
    map.entry(child)
        .or_insert_with(|| fallback.and_then(|f| f.get(&child)).cloned().unwrap_or_default())
}

#[derive(Debug, Clone, Default)]
struct BaseLayer {
    entities: HashMap<EntityId, Arc<Entity>>,
    parents: ParentIndex,
}

#[derive(Debug, Clone, Default)]
struct LocalLayer {
    /// `None` is a tombstone
    entities: HashMap<EntityId, Option<Arc<Entity>>>,
    parents: ParentIndex,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    base: Arc<BaseLayer>,
    local: Arc<LocalLayer>,
    next_ids: NextIds,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A graph whose base layer holds `entities`
    pub fn from_base(entities: impl IntoIterator<Item = Entity>) -> Self {
        let entities: Vec<Arc<Entity>> = entities.into_iter().map(Arc::new).collect();
        Graph::new().rebased(&entities, false)
    }

    /// True when both graphs share the same layers (cheap identity check)
    pub fn ptr_eq(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.base, &other.base) && Arc::ptr_eq(&self.local, &other.local)
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// Effective entity for `id`, or `None` if absent or tombstoned
    pub fn has_entity(&self, id: EntityId) -> Option<&Arc<Entity>> {
        match self.local.entities.get(&id) {
            Some(local) => local.as_ref(),
            None => self.base.entities.get(&id),
        }
    }

    pub fn entity(&self, id: EntityId) -> Result<&Arc<Entity>, GraphError> {
        self.has_entity(id).ok_or(GraphError::NotFound(id))
    }

    /// The entity in the base layer, ignoring local overrides
    pub fn base_entity(&self, id: EntityId) -> Option<&Arc<Entity>> {
        self.base.entities.get(&id)
    }

    /// True if the local layer overrides `id` (edit or tombstone)
    pub fn is_locally_edited(&self, id: EntityId) -> bool {
        self.local.entities.contains_key(&id)
    }

    /// True if `id` has been removed in this snapshot
    pub fn is_tombstoned(&self, id: EntityId) -> bool {
        matches!(self.local.entities.get(&id), Some(None))
    }

    pub fn base_entities(&self) -> impl Iterator<Item = &Arc<Entity>> + '_ {
        self.base.entities.values()
    }

    /// Local overrides; `None` marks a removed entity
    pub fn local_entities(&self) -> impl Iterator<Item = (EntityId, Option<&Arc<Entity>>)> + '_ {
        self.local.entities.iter().map(|(id, entity)| (*id, entity.as_ref()))
    }

    pub(crate) fn local_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.local.entities.keys().copied()
    }

    /// Every present entity, local overrides applied
    pub fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> + '_ {
        let base = self
            .base
            .entities
            .iter()
            .filter(move |(id, _)| !self.local.entities.contains_key(*id))
            .map(|(_, entity)| entity);
        base.chain(self.local.entities.values().flatten())
    }

    // ---------------------------------------------------------------
    // Ids
    // ---------------------------------------------------------------

    /// The id a fresh entity of `kind` gets in this graph
    pub fn next_id(&self, kind: EntityKind) -> EntityId {
        self.next_ids.peek(kind)
    }

    pub fn next_ids(&self) -> NextIds {
        self.next_ids
    }

    /// Reserve a fresh id of `kind` in this graph
    pub fn allocate_id(&mut self, kind: EntityKind) -> EntityId {
        self.next_ids.allocate(kind)
    }

    /// Never hand out ids at or above the ones in `ids`
    pub fn with_next_ids(mut self, ids: NextIds) -> Self {
        self.next_ids.merge(&ids);
        self
    }

    // ---------------------------------------------------------------
    // Parents and children
    // ---------------------------------------------------------------

    fn parent_set(&self, kind: EntityKind, id: EntityId) -> Option<&ParentIds> {
        self.local
            .parents
            .map(kind)
            .and_then(|m| m.get(&id))
            .or_else(|| self.base.parents.map(kind).and_then(|m| m.get(&id)))
    }

    pub fn parent_way_ids(&self, id: EntityId) -> Vec<EntityId> {
        self.parent_set(EntityKind::Way, id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn parent_relation_ids(&self, id: EntityId) -> Vec<EntityId> {
        self.parent_set(EntityKind::Relation, id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn parent_ways(&self, id: EntityId) -> Vec<&Arc<Entity>> {
        self.parent_way_ids(id).into_iter().filter_map(|p| self.has_entity(p)).collect()
    }

    pub fn parent_relations(&self, id: EntityId) -> Vec<&Arc<Entity>> {
        self.parent_relation_ids(id)
            .into_iter()
            .filter_map(|p| self.has_entity(p))
            .collect()
    }

    pub fn parent_multipolygons(&self, id: EntityId) -> Vec<&Arc<Entity>> {
        self.parent_relations(id)
            .into_iter()
            .filter(|r| r.as_relation().is_some_and(|r| r.is_multipolygon()))
            .collect()
    }

    /// No parent ways
    pub fn is_poi(&self, id: EntityId) -> bool {
        self.parent_set(EntityKind::Way, id).map_or(true, |set| set.is_empty())
    }

    /// More than one parent way
    pub fn is_shared(&self, id: EntityId) -> bool {
        self.parent_set(EntityKind::Way, id).is_some_and(|set| set.len() > 1)
    }

    /// The way's nodes that are loaded, in way order
    pub fn child_nodes(&self, way: &Way) -> Vec<&Node> {
        way.nodes
            .iter()
            .filter_map(|id| self.has_entity(*id))
            .filter_map(|e| e.as_node())
            .collect()
    }

    /// Child ids of `entity` that this graph cannot resolve
    pub fn missing_members(&self, entity: &Entity) -> Vec<EntityId> {
        entity
            .child_ids()
            .into_iter()
            .filter(|id| self.has_entity(*id).is_none())
            .collect()
    }

    pub fn is_complete(&self, entity: &Entity) -> bool {
        self.missing_members(entity).is_empty()
    }

    /// Every node reachable from `id` through way nodes and relation members
    pub fn descendant_node_ids(&self, id: EntityId) -> BTreeSet<EntityId> {
        let mut nodes = BTreeSet::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            match self.has_entity(id).map(|e| e.as_ref()) {
                Some(Entity::Node(node)) => {
                    nodes.insert(node.id);
                }
                Some(entity) => stack.extend(entity.child_ids()),
                None => {}
            }
        }
        nodes
    }

    /// Bounding box over the resolvable geometry of `entity`; empty when
    /// nothing resolves
    pub fn extent(&self, entity: &Entity) -> Extent {
        let mut seen = HashSet::new();
        self.extent_inner(entity, &mut seen)
    }

    fn extent_inner(&self, entity: &Entity, seen: &mut HashSet<EntityId>) -> Extent {
        if !seen.insert(entity.id()) {
            return Extent::EMPTY;
        }
        match entity {
            Entity::Node(node) => node.extent(),
            Entity::Way(way) => self.child_nodes(way).iter().fold(Extent::EMPTY, |mut extent, node| {
                extent.extend_point(node.loc);
                extent
            }),
            Entity::Relation(relation) => {
                let mut extent = Extent::EMPTY;
                for member in &relation.members {
                    if let Some(child) = self.has_entity(member.id) {
                        extent.extend(&self.extent_inner(child, seen));
                    }
                }
                extent
            }
        }
    }

    // ---------------------------------------------------------------
    // Edits
    // ---------------------------------------------------------------

    /// New graph with `entity` in the local layer
    pub fn replace(&self, entity: impl Into<Arc<Entity>>) -> Graph {
        let mut graph = self.clone();
        graph.replace_mut(entity);
        graph
    }

    /// New graph with `id` tombstoned
    pub fn remove(&self, id: EntityId) -> Graph {
        let mut graph = self.clone();
        graph.remove_mut(id);
        graph
    }

    /// New graph with the local override of `id` dropped
    pub fn revert(&self, id: EntityId) -> Graph {
        let mut graph = self.clone();
        graph.revert_mut(id);
        graph
    }

    pub fn replace_mut(&mut self, entity: impl Into<Arc<Entity>>) {
        let entity = entity.into();
        let id = entity.id();
        let current = self.has_entity(id).cloned();
        if current.as_deref() == Some(entity.as_ref()) {
            return;
        }

        self.next_ids.observe(id);
        let local = Arc::make_mut(&mut self.local);
        local
            .parents
            .apply_change(Some(&self.base.parents), current.as_deref(), Some(entity.as_ref()));
        local.entities.insert(id, Some(entity));
    }

    pub fn remove_mut(&mut self, id: EntityId) {
        let Some(current) = self.has_entity(id).cloned() else {
            return;
        };

        let local = Arc::make_mut(&mut self.local);
        local.parents.apply_change(Some(&self.base.parents), Some(current.as_ref()), None);
        local.entities.insert(id, None);
    }

    pub fn revert_mut(&mut self, id: EntityId) {
        if !self.local.entities.contains_key(&id) {
            return;
        }
        let original = self.base.entities.get(&id).cloned();
        let current = self.has_entity(id).cloned();

        let local = Arc::make_mut(&mut self.local);
        local
            .parents
            .apply_change(Some(&self.base.parents), current.as_deref(), original.as_deref());
        local.entities.remove(&id);
    }

    /// Run `f` against a scratch copy and return the result as one new graph
    pub fn update(&self, f: impl FnOnce(&mut Graph)) -> Graph {
        let mut graph = self.clone();
        f(&mut graph);
        graph
    }

    /// Like [`Graph::update`]; on error nothing escapes
    pub fn try_update<E>(&self, f: impl FnOnce(&mut Graph) -> Result<(), E>) -> Result<Graph, E> {
        let mut graph = self.clone();
        f(&mut graph)?;
        Ok(graph)
    }

    /// Same base, local layer replaced by `modified` and `deleted`
    ///
    /// Used when restoring a saved history: the saved overrides are laid on
    /// top of whatever the base currently holds.
    pub fn load(
        &self,
        modified: impl IntoIterator<Item = Arc<Entity>>,
        deleted: impl IntoIterator<Item = EntityId>,
    ) -> Graph {
        let mut graph = Graph {
            base: self.base.clone(),
            local: Arc::new(LocalLayer::default()),
            next_ids: self.next_ids,
        };
        let local = Arc::make_mut(&mut graph.local);

        for entity in modified {
            let id = entity.id();
            graph.next_ids.observe(id);
            let original = graph.base.entities.get(&id);
            local
                .parents
                .apply_change(Some(&graph.base.parents), original.map(|e| e.as_ref()), Some(entity.as_ref()));
            local.entities.insert(id, Some(entity));
        }
        for id in deleted {
            let original = graph.base.entities.get(&id);
            local
                .parents
                .apply_change(Some(&graph.base.parents), original.map(|e| e.as_ref()), None);
            local.entities.insert(id, None);
        }
        graph
    }

    // ---------------------------------------------------------------
    // Rebase
    // ---------------------------------------------------------------

    /// Merge a remote batch into the base shared by `graphs`
    ///
    /// The last graph is the head. Invisible entities are skipped, as are ids
    /// the base already has unless `force`. Local overrides are untouched, so
    /// a local edit wins over incoming data, including when both carry the
    /// same version. With `force` the incoming value replaces a differing
    /// local override as well; local removals are kept either way.
    ///
    /// Returns one rebased graph per input graph, in order, all sharing the
    /// new base.
    #[instrument(skip_all, fields(entities = entities.len(), graphs = graphs.len(), force))]
    pub fn rebase(entities: &[Arc<Entity>], graphs: &[Graph], force: bool) -> Vec<Graph> {
        let Some(head) = graphs.last() else {
            return Vec::new();
        };

        let mut base = BaseLayer::clone(&head.base);
        let mut restore: BTreeSet<EntityId> = BTreeSet::new();
        let mut applied: Vec<EntityId> = Vec::new();
        let mut detached: Vec<(EntityKind, EntityId, EntityId)> = Vec::new();

        for entity in entities {
            if !entity.visible() {
                continue;
            }
            let id = entity.id();
            let previous = base.entities.get(&id).cloned();
            if previous.is_some() && !force {
                continue;
            }

            if let Some(previous) = previous.as_deref() {
                let kept: HashSet<EntityId> = entity.child_ids().into_iter().collect();
                detached.extend(
                    previous
                        .child_ids()
                        .into_iter()
                        .filter(|child| !kept.contains(child))
                        .map(|child| (entity.kind(), child, id)),
                );
            }
            base.parents.apply_change(None, previous.as_deref(), Some(entity.as_ref()));
            base.entities.insert(id, entity.clone());
            applied.push(id);

            // A node removed locally that turns out to belong to a way comes back
            if let Entity::Way(way) = entity.as_ref() {
                restore.extend(way.nodes.iter().copied().filter(|node| head.is_tombstoned(*node)));
            }
        }

        if applied.is_empty() {
            debug!("Nothing new to rebase");
            return graphs.to_vec();
        }

        let base = Arc::new(base);
        let rebased = graphs
            .iter()
            .map(|graph| {
                let mut graph = graph.clone();
                graph.base = base.clone();
                if restore.iter().any(|id| graph.is_tombstoned(*id)) {
                    let local = Arc::make_mut(&mut graph.local);
                    for id in &restore {
                        if matches!(local.entities.get(id), Some(None)) {
                            debug!(node = %id, "Restoring node referenced by rebased way");
                            local.entities.remove(id);
                        }
                    }
                }
                graph.detach_base_parents(&detached);
                if force {
                    for id in &applied {
                        let overridden = matches!(
                            graph.local.entities.get(id),
                            Some(Some(local)) if graph.base.entities.get(id) != Some(local)
                        );
                        if overridden {
                            debug!(entity = %id, "Forced rebase replaces local override");
                            graph.revert_mut(*id);
                        }
                    }
                }
                graph.absorb_base_parents();
                graph
            })
            .collect();

        info!(merged = applied.len(), restored = restore.len(), "Rebased remote entities");
        rebased
    }

    /// [`Graph::rebase`] for a single graph
    pub fn rebased(&self, entities: &[Arc<Entity>], force: bool) -> Graph {
        Graph::rebase(entities, std::slice::from_ref(self), force)
            .pop()
            .unwrap_or_else(|| self.clone())
    }

    /// Drop local parent entries for `(kind, child, parent)` links the base
    /// no longer has, unless the parent is overridden here
    fn detach_base_parents(&mut self, detached: &[(EntityKind, EntityId, EntityId)]) {
        let stale: Vec<(EntityKind, EntityId, EntityId)> = detached
            .iter()
            .copied()
            .filter(|(kind, child, parent)| {
                !self.local.entities.contains_key(parent)
                    && self
                        .local
                        .parents
                        .map(*kind)
                        .and_then(|map| map.get(child))
                        .is_some_and(|parents| parents.contains(parent))
            })
            .collect();

        if stale.is_empty() {
            return;
        }
        let local = Arc::make_mut(&mut self.local);
        for (kind, child, parent) in stale {
            if let Some(parents) = local.parents.map_mut(kind).and_then(|map| map.get_mut(&child)) {
                parents.remove(&parent);
            }
        }
    }

    /// Local parent entries gain the base's parents that were not edited here
    fn absorb_base_parents(&mut self) {
        let mut additions: Vec<(EntityKind, EntityId, EntityId)> = Vec::new();
        for kind in [EntityKind::Way, EntityKind::Relation] {
            let (Some(local), Some(base)) = (self.local.parents.map(kind), self.base.parents.map(kind)) else {
                continue;
            };
            for (child, parents) in local {
                let Some(base_parents) = base.get(child) else {
                    continue;
                };
                for parent in base_parents {
                    if !parents.contains(parent) && !self.local.entities.contains_key(parent) {
                        additions.push((kind, *child, *parent));
                    }
                }
            }
        }

        if additions.is_empty() {
            return;
        }
        let local = Arc::make_mut(&mut self.local);
        for (kind, child, parent) in additions {
            if let Some(map) = local.parents.map_mut(kind) {
                map.entry(child).or_default().insert(parent);
            }
        }
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.base, &other.base) || self.base.entities == other.base.entities)
            && (Arc::ptr_eq(&self.local, &other.local) || self.local.entities == other.local.entities)
    }
}
