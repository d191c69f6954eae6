//! # Ways
//!
//! A way is an ordered list of node ids. A closed way repeats its first node
//! at the end; every edit below keeps a closed way closed and collapses
//! consecutive repeats that an edit would otherwise leave behind.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{EntityError, EntityId, EntityKind, Tags};

/// Keys that make a closed way an area rather than a loop of line
const AREA_KEYS: &[&str] = &["amenity", "building", "landuse", "leisure", "natural", "place", "area:highway"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: EntityId,

    #[serde(default)]
    pub version: u64,

    #[serde(default = "crate::entity::default_visible")]
    pub visible: bool,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,

    #[serde(default)]
    pub nodes: Vec<EntityId>,
}

impl Way {
    pub fn new(id: EntityId, nodes: Vec<EntityId>) -> Self {
        debug_assert_eq!(id.kind(), EntityKind::Way, "{id} is not a way id");
        Self {
            id,
            version: 0,
            visible: true,
            tags: Tags::new(),
            nodes,
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Copy-on-write edit; the copy keeps the id and gets the next version
    pub fn update(&self, f: impl FnOnce(&mut Way)) -> Way {
        let mut next = self.clone();
        f(&mut next);
        next.id = self.id;
        next.version = self.version + 1;
        next
    }

    pub fn first(&self) -> Option<EntityId> {
        self.nodes.first().copied()
    }

    pub fn last(&self) -> Option<EntityId> {
        self.nodes.last().copied()
    }

    pub fn contains(&self, node: EntityId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 1 && self.first() == self.last()
    }

    pub fn is_area(&self) -> bool {
        if !self.is_closed() {
            return false;
        }
        match self.tags.get("area").map(String::as_str) {
            Some("yes") => true,
            Some("no") => false,
            _ => {
                self.tags.get("natural").map(String::as_str) != Some("coastline")
                    && AREA_KEYS.iter().any(|k| self.tags.contains_key(*k))
            }
        }
    }

    /// Fewer unique nodes than the geometry needs (2 for lines, 3 for areas)
    pub fn is_degenerate(&self) -> bool {
        let unique: HashSet<_> = self.nodes.iter().collect();
        unique.len() < if self.is_area() { 3 } else { 2 }
    }

    /// True if `a` and `b` are consecutive in either direction
    pub fn are_adjacent(&self, a: EntityId, b: EntityId) -> bool {
        self.nodes
            .windows(2)
            .any(|pair| (pair[0] == a && pair[1] == b) || (pair[0] == b && pair[1] == a))
    }

    /// Unique node ids in first-seen order
    pub fn unique_nodes(&self) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        self.nodes.iter().copied().filter(|id| seen.insert(*id)).collect()
    }

    /// Insert `node` at `index`, or before the closing connector (or at the
    /// end) when no index is given
    pub fn add_node(&self, node: EntityId, index: Option<usize>) -> Result<Way, EntityError> {
        let mut nodes = self.nodes.clone();
        let closed = self.is_closed();
        let max = if closed { nodes.len() - 1 } else { nodes.len() };
        let mut index = index.unwrap_or(max);

        if index > max {
            return Err(EntityError::IndexOutOfRange { id: self.id, index, max });
        }

        if closed {
            strip_connectors(&mut nodes, &mut index);
        }

        nodes.insert(index, node);
        let nodes = finish_edit(nodes, closed);
        Ok(self.update(|w| w.nodes = nodes))
    }

    /// Replace the node at `index` with `node`
    pub fn update_node(&self, node: EntityId, index: usize) -> Result<Way, EntityError> {
        if self.nodes.is_empty() || index >= self.nodes.len() {
            return Err(EntityError::IndexOutOfRange {
                id: self.id,
                index,
                max: self.nodes.len().saturating_sub(1),
            });
        }

        let mut nodes = self.nodes.clone();
        let closed = self.is_closed();
        let mut index = index;

        if closed {
            strip_connectors(&mut nodes, &mut index);
        }

        if index < nodes.len() {
            nodes[index] = node;
        } else {
            nodes.push(node);
        }
        let nodes = finish_edit(nodes, closed);
        Ok(self.update(|w| w.nodes = nodes))
    }

    /// Remove every occurrence of `node`
    pub fn remove_node(&self, node: EntityId) -> Result<Way, EntityError> {
        if !self.contains(node) {
            return Err(EntityError::NodeNotInWay { way: self.id, node });
        }

        let closed = self.is_closed();
        let nodes: Vec<_> = self.nodes.iter().copied().filter(|id| *id != node).collect();
        let nodes = finish_edit(nodes, closed);
        Ok(self.update(|w| w.nodes = nodes))
    }

    /// Swap every occurrence of `needle` for `replacement`
    pub fn replace_node(&self, needle: EntityId, replacement: EntityId) -> Result<Way, EntityError> {
        if !self.contains(needle) {
            return Err(EntityError::NodeNotInWay { way: self.id, node: needle });
        }

        let closed = self.is_closed();
        let nodes: Vec<_> = self
            .nodes
            .iter()
            .map(|id| if *id == needle { replacement } else { *id })
            .collect();
        let nodes = finish_edit(nodes, closed);
        Ok(self.update(|w| w.nodes = nodes))
    }

    pub fn close(&self) -> Way {
        if self.is_closed() || self.nodes.is_empty() {
            return self.clone();
        }
        let mut nodes = dedup_consecutive(self.nodes.clone());
        nodes.push(nodes[0]);
        self.update(|w| w.nodes = nodes)
    }

    pub fn unclose(&self) -> Way {
        if !self.is_closed() {
            return self.clone();
        }
        let connector = self.nodes[0];
        let mut nodes = self.nodes.clone();
        while nodes.len() > 1 && nodes.last() == Some(&connector) {
            nodes.pop();
        }
        let nodes = dedup_consecutive(nodes);
        self.update(|w| w.nodes = nodes)
    }
}

/// Drop every repeated connector except the leading one, shifting `index`
/// so it still points at the same slot
fn strip_connectors(nodes: &mut Vec<EntityId>, index: &mut usize) {
    let connector = nodes[0];

    let mut i = 1;
    while i < nodes.len() && nodes.len() > 2 && nodes[i] == connector {
        nodes.remove(i);
        if *index > i {
            *index -= 1;
        }
    }

    while nodes.len() > 1 && nodes[nodes.len() - 1] == connector {
        let i = nodes.len() - 1;
        nodes.remove(i);
        if *index > i {
            *index -= 1;
        }
    }
}

fn dedup_consecutive(mut nodes: Vec<EntityId>) -> Vec<EntityId> {
    nodes.dedup();
    nodes
}

fn finish_edit(nodes: Vec<EntityId>, was_closed: bool) -> Vec<EntityId> {
    let mut nodes = dedup_consecutive(nodes);
    if was_closed && !nodes.is_empty() && (nodes.len() == 1 || nodes[0] != nodes[nodes.len() - 1]) {
        nodes.push(nodes[0]);
    }
    nodes
}
