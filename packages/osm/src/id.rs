//! # Entity Identifiers
//!
//! Every entity is addressed by its kind plus a signed number. Remote data
//! always carries positive numbers; anything created on the client is
//! allocated from the negative range, so the two namespaces never collide.
//!
//! The textual form matches what the rest of the editor prints and stores:
//! `n123` for a node, `w-4` for a way the user just drew, `r7` for a relation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::EntityError;

/// Which variant an id resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Way,
    Relation,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Node, EntityKind::Way, EntityKind::Relation];

    fn prefix(self) -> char {
        match self {
            EntityKind::Node => 'n',
            EntityKind::Way => 'w',
            EntityKind::Relation => 'r',
        }
    }

    fn from_prefix(c: char) -> Option<Self> {
        match c {
            'n' => Some(EntityKind::Node),
            'w' => Some(EntityKind::Way),
            'r' => Some(EntityKind::Relation),
            _ => None,
        }
    }

    fn slot(self) -> usize {
        match self {
            EntityKind::Node => 0,
            EntityKind::Way => 1,
            EntityKind::Relation => 2,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Node => "node",
            EntityKind::Way => "way",
            EntityKind::Relation => "relation",
        };
        f.write_str(name)
    }
}

/// Stable entity identifier
///
/// Ordering is by kind first (nodes, then ways, then relations) and then by
/// number, which gives query results a deterministic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    kind: EntityKind,
    number: i64,
}

impl EntityId {
    pub const fn new(kind: EntityKind, number: i64) -> Self {
        Self { kind, number }
    }

    pub const fn node(number: i64) -> Self {
        Self::new(EntityKind::Node, number)
    }

    pub const fn way(number: i64) -> Self {
        Self::new(EntityKind::Way, number)
    }

    pub const fn relation(number: i64) -> Self {
        Self::new(EntityKind::Relation, number)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    /// Created on this client and never uploaded
    pub fn is_new(&self) -> bool {
        self.number < 0
    }

    /// The id as the remote source knows it (`"123"` for `n123`)
    pub fn to_osm(&self) -> String {
        self.number.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.number)
    }
}

impl FromStr for EntityId {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let kind = chars
            .next()
            .and_then(EntityKind::from_prefix)
            .ok_or_else(|| EntityError::InvalidId(s.to_string()))?;
        let number = chars
            .as_str()
            .parse::<i64>()
            .map_err(|_| EntityError::InvalidId(s.to_string()))?;
        Ok(Self { kind, number })
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

/// Counters for client-created ids, one per kind
///
/// The counters only ever move downwards. A graph snapshot carries its own
/// copy so that allocating from the same snapshot twice yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextIds {
    node: i64,
    way: i64,
    relation: i64,
}

impl NextIds {
    pub fn new() -> Self {
        Self {
            node: -1,
            way: -1,
            relation: -1,
        }
    }

    fn counters(&self) -> [i64; 3] {
        [self.node, self.way, self.relation]
    }

    fn counter_mut(&mut self, kind: EntityKind) -> &mut i64 {
        match kind {
            EntityKind::Node => &mut self.node,
            EntityKind::Way => &mut self.way,
            EntityKind::Relation => &mut self.relation,
        }
    }

    /// The id the next allocation of `kind` would return
    pub fn peek(&self, kind: EntityKind) -> EntityId {
        EntityId::new(kind, self.counters()[kind.slot()])
    }

    /// Allocate a fresh id of `kind`
    pub fn allocate(&mut self, kind: EntityKind) -> EntityId {
        let id = self.peek(kind);
        *self.counter_mut(kind) -= 1;
        id
    }

    /// Make sure a client id that entered from elsewhere is never handed out again
    pub fn observe(&mut self, id: EntityId) {
        if id.is_new() {
            let counter = self.counter_mut(id.kind());
            if id.number() <= *counter {
                *counter = id.number() - 1;
            }
        }
    }

    /// Keep the lowest counter of each kind
    pub fn merge(&mut self, other: &NextIds) {
        self.node = self.node.min(other.node);
        self.way = self.way.min(other.way);
        self.relation = self.relation.min(other.relation);
    }
}

impl Default for NextIds {
    fn default() -> Self {
        Self::new()
    }
}
