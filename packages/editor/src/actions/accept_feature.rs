//! # Feature acceptance
//!
//! Brings an entity from a foreign graph (an import or machine-generated
//! dataset) into the local graph, together with its transitive members.
//!
//! Foreign nodes may carry two hints, both stripped on the way in:
//!
//! - `dupe=<node id>`: the node duplicates an existing local node. When the
//!   two are within [`DUPLICATE_EPSILON`] the local node is reused.
//! - `conn=<way id>,<node A>,<node B>`: the node should be spliced into an
//!   existing local way between A and B. The insertion point is found by
//!   walking the nodes between A and B along the dominant axis, and the node
//!   is snapped onto that segment so the existing line keeps its shape. The
//!   splice is skipped when snapping would move the node by more than the
//!   epsilon or when A and B are not in order on the way.

use std::collections::HashSet;

use mapedit_graph::Graph;
use mapedit_osm::{Entity, EntityId, EntityKind, Loc, Member, Node, Relation, Tags, Way};
use tracing::debug;

use crate::{Action, DisabledReason, EditError};

/// Largest coordinate difference, in degrees, still treated as the same place
pub const DUPLICATE_EPSILON: f64 = 2e-5;

const DUPLICATE_TAG: &str = "dupe";
const CONNECTION_TAG: &str = "conn";

/// Accept `id` from `foreign` into the graph
#[derive(Debug, Clone)]
pub struct AcceptFeature {
    pub id: EntityId,
    pub foreign: Graph,
}

impl AcceptFeature {
    pub fn new(id: EntityId, foreign: Graph) -> Self {
        Self { id, foreign }
    }
}

impl Action for AcceptFeature {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        graph.try_update(|graph| -> Result<(), EditError> {
            let mut acceptor = Acceptor {
                foreign: &self.foreign,
                graph,
                relations: HashSet::new(),
            };
            let accepted = acceptor.accept(self.id)?;
            debug!(foreign = %self.id, accepted = %accepted, "Accepted feature");
            Ok(())
        })
    }

    fn disabled(&self, _graph: &Graph) -> Option<DisabledReason> {
        self.foreign.has_entity(self.id).is_none().then_some(DisabledReason::NotFound)
    }

    fn name(&self) -> &'static str {
        "accept_feature"
    }
}

struct Acceptor<'a> {
    foreign: &'a Graph,
    graph: &'a mut Graph,
    /// Relations already materialized (or in progress) in this run
    relations: HashSet<EntityId>,
}

impl Acceptor<'_> {
    fn accept(&mut self, id: EntityId) -> Result<EntityId, EditError> {
        let entity = self.foreign.entity(id)?.clone();
        match entity.as_ref() {
            Entity::Node(node) => Ok(self.accept_node(node)),
            Entity::Way(way) => self.accept_way(way),
            Entity::Relation(relation) => self.accept_relation(relation),
        }
    }

    fn accept_node(&mut self, node: &Node) -> EntityId {
        let mut node = node.clone();
        strip_hints(&mut node.tags);
        let id = node.id;
        self.graph.replace_mut(Entity::from(node));
        id
    }

    fn accept_way(&mut self, way: &Way) -> Result<EntityId, EditError> {
        let source = self.foreign;
        let mut nodes = Vec::with_capacity(way.nodes.len());
        for node_id in &way.nodes {
            let foreign = source.entity(*node_id)?.node()?;
            nodes.push(self.accept_way_node(foreign)?);
        }

        let way = way.update(|way| {
            strip_hints(&mut way.tags);
            way.nodes = nodes;
        });
        let id = way.id;
        self.graph.replace_mut(Entity::from(way));
        Ok(id)
    }

    fn accept_way_node(&mut self, foreign: &Node) -> Result<EntityId, EditError> {
        let duplicate_of = foreign.tags.get(DUPLICATE_TAG).and_then(|v| v.parse::<EntityId>().ok());
        let connection = foreign.tags.get(CONNECTION_TAG).and_then(|v| parse_connection(v));

        let mut node = foreign.clone();
        strip_hints(&mut node.tags);

        let local_duplicate = duplicate_of
            .and_then(|id| self.graph.has_entity(id))
            .and_then(|e| e.as_node())
            .filter(|local| !local.loc.differs_from(&node.loc, DUPLICATE_EPSILON))
            .cloned();

        if let Some(local) = local_duplicate {
            node = local;
        } else if let Some(existing) = self.graph.has_entity(node.id).and_then(|e| e.as_node()) {
            if existing.loc.differs_from(&node.loc, DUPLICATE_EPSILON) {
                let id = self.graph.allocate_id(EntityKind::Node);
                debug!(foreign = %node.id, fresh = %id, "Node id taken at another location");
                node = Node::new(id, node.loc).with_tags(node.tags);
            }
        }

        if let Some((way_id, a, b)) = connection {
            self.splice(&mut node, way_id, a, b)?;
        }

        let id = node.id;
        self.graph.replace_mut(Entity::from(node));
        Ok(id)
    }

    /// Insert `node` into the local way `way_id` between `a` and `b`, snapping it onto the segment
    fn splice(&mut self, node: &mut Node, way_id: EntityId, a: EntityId, b: EntityId) -> Result<(), EditError> {
        let target = self.graph.has_entity(way_id).and_then(|e| e.as_way());
        let node_a = self.graph.has_entity(a).and_then(|e| e.as_node());
        let node_b = self.graph.has_entity(b).and_then(|e| e.as_node());
        let (Some(target), Some(node_a), Some(node_b)) = (target, node_a, node_b) else {
            return Ok(());
        };

        let Some((index, loc)) = find_connection_point(self.graph, node.loc, target, node_a, node_b) else {
            return Ok(());
        };
        if loc.differs_from(&node.loc, DUPLICATE_EPSILON) {
            debug!(node = %node.id, way = %way_id, "Connection point too far, not splicing");
            return Ok(());
        }

        let spliced = target.add_node(node.id, Some(index))?;
        node.loc = loc;
        self.graph.replace_mut(Entity::from(spliced));
        Ok(())
    }

    fn accept_relation(&mut self, relation: &Relation) -> Result<EntityId, EditError> {
        if !self.relations.insert(relation.id) {
            return Ok(relation.id);
        }

        let mut members = Vec::with_capacity(relation.members.len());
        for member in &relation.members {
            let id = if self.foreign.has_entity(member.id).is_some() {
                self.accept(member.id)?
            } else {
                member.id
            };
            members.push(Member::new(id, member.role.clone()));
        }

        let relation = relation.update(|relation| {
            strip_hints(&mut relation.tags);
            relation.members = members;
        });
        let id = relation.id;
        self.graph.replace_mut(Entity::from(relation));
        Ok(id)
    }
}

fn strip_hints(tags: &mut Tags) {
    tags.remove(DUPLICATE_TAG);
    tags.remove(CONNECTION_TAG);
}

/// `w316,n32,n33` into its three ids
fn parse_connection(value: &str) -> Option<(EntityId, EntityId, EntityId)> {
    let mut parts = value.split(',').map(|p| p.trim().parse::<EntityId>().ok());
    let (way, a, b) = (parts.next()??, parts.next()??, parts.next()??);
    (way.kind() == EntityKind::Way).then_some((way, a, b))
}

/// Where `loc` belongs on `way` between `a` and `b`
///
/// Returns the index to insert before and `loc` snapped onto the segment it
/// falls in. `None` when A and B are not both on the way in that order, a
/// node between them is not loaded, or the segment has zero length.
fn find_connection_point(graph: &Graph, loc: Loc, way: &Way, a: &Node, b: &Node) -> Option<(usize, Loc)> {
    let by_lon = (a.loc.lon - b.loc.lon).abs() > (a.loc.lat - b.loc.lat).abs();
    let axis = |loc: Loc| if by_lon { loc.lon } else { loc.lat };
    let ascending = axis(a.loc) < axis(b.loc);
    let compare = |l1: Loc, l2: Loc| if ascending { axis(l1) - axis(l2) } else { axis(l2) - axis(l1) };

    let index_a = way.nodes.iter().position(|id| *id == a.id)?;
    let index_b = way.nodes.iter().position(|id| *id == b.id)?;
    if index_a >= index_b || compare(a.loc, b.loc) >= 0.0 {
        return None;
    }

    let loc_at = |i: usize| graph.has_entity(way.nodes[i]).and_then(|e| e.as_node()).map(|n| n.loc);

    let mut insert = index_a + 1;
    while insert < index_b && compare(loc, loc_at(insert)?) > 0.0 {
        insert += 1;
    }

    let (start, end) = (loc_at(insert - 1)?, loc_at(insert)?);
    let (offset, length) = if (start.lon - end.lon).abs() > (start.lat - end.lat).abs() {
        (loc.lon - start.lon, end.lon - start.lon)
    } else {
        (loc.lat - start.lat, end.lat - start.lat)
    };
    let t = offset / length;
    if !t.is_finite() {
        return None;
    }
    Some((insert, Loc::interp(start, end, t)))
}
