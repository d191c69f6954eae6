//! # Entities
//!
//! The closed set of map features. Entities are plain immutable values: every
//! edit goes through an `update` that clones, applies, and bumps `version`, so
//! older graph snapshots keep pointing at the value they saw.

use serde::{Deserialize, Serialize};

use crate::{has_interesting_tags, EntityError, EntityId, EntityKind, Node, Relation, Tags, Way};

pub(crate) fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entity {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Node(n) => n.id,
            Entity::Way(w) => w.id,
            Entity::Relation(r) => r.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.id().kind()
    }

    pub fn version(&self) -> u64 {
        match self {
            Entity::Node(n) => n.version,
            Entity::Way(w) => w.version,
            Entity::Relation(r) => r.version,
        }
    }

    /// False for entities the remote source reports as deleted
    pub fn visible(&self) -> bool {
        match self {
            Entity::Node(n) => n.visible,
            Entity::Way(w) => w.visible,
            Entity::Relation(r) => r.visible,
        }
    }

    pub fn tags(&self) -> &Tags {
        match self {
            Entity::Node(n) => &n.tags,
            Entity::Way(w) => &w.tags,
            Entity::Relation(r) => &r.tags,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id().is_new()
    }

    /// Unique key of this exact value, e.g. `n1@3`
    pub fn key(&self) -> String {
        format!("{}@{}", self.id(), self.version())
    }

    pub fn has_interesting_tags(&self) -> bool {
        has_interesting_tags(self.tags())
    }

    pub fn is_degenerate(&self) -> bool {
        match self {
            Entity::Node(n) => n.is_degenerate(),
            Entity::Way(w) => w.is_degenerate(),
            Entity::Relation(r) => r.is_degenerate(),
        }
    }

    /// Ids this entity references: a way's nodes or a relation's members,
    /// deduplicated in first-seen order
    pub fn child_ids(&self) -> Vec<EntityId> {
        match self {
            Entity::Node(_) => Vec::new(),
            Entity::Way(w) => w.unique_nodes(),
            Entity::Relation(r) => r.member_ids(),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Entity::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_way(&self) -> Option<&Way> {
        match self {
            Entity::Way(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_relation(&self) -> Option<&Relation> {
        match self {
            Entity::Relation(r) => Some(r),
            _ => None,
        }
    }

    pub fn node(&self) -> Result<&Node, EntityError> {
        self.as_node().ok_or_else(|| self.wrong_kind(EntityKind::Node))
    }

    pub fn way(&self) -> Result<&Way, EntityError> {
        self.as_way().ok_or_else(|| self.wrong_kind(EntityKind::Way))
    }

    pub fn relation(&self) -> Result<&Relation, EntityError> {
        self.as_relation().ok_or_else(|| self.wrong_kind(EntityKind::Relation))
    }

    fn wrong_kind(&self, expected: EntityKind) -> EntityError {
        EntityError::WrongKind { id: self.id(), expected }
    }

    fn tags_mut(&mut self) -> &mut Tags {
        match self {
            Entity::Node(n) => &mut n.tags,
            Entity::Way(w) => &mut w.tags,
            Entity::Relation(r) => &mut r.tags,
        }
    }

    fn set_version(&mut self, version: u64) {
        match self {
            Entity::Node(n) => n.version = version,
            Entity::Way(w) => w.version = version,
            Entity::Relation(r) => r.version = version,
        }
    }

    /// Copy-on-write edit over any variant. The closure must not change the
    /// variant or id; the copy gets the next version.
    pub fn update(&self, f: impl FnOnce(&mut Entity)) -> Entity {
        let mut next = self.clone();
        f(&mut next);
        debug_assert_eq!(next.id(), self.id(), "update changed the entity id");
        next.set_version(self.version() + 1);
        next
    }

    /// Replace all tags (version + 1)
    pub fn with_new_tags(&self, tags: Tags) -> Entity {
        self.update(|e| *e.tags_mut() = tags)
    }

    /// Add `tags` on top of the existing ones. A key present on both sides
    /// with different values keeps both, joined with `;`. Returns an equal
    /// copy without a version bump when nothing changes.
    pub fn merge_tags(&self, tags: &Tags) -> Entity {
        let mut merged = self.tags().clone();
        for (k, v) in tags {
            match merged.get(k) {
                Some(existing) if existing == v => {}
                Some(existing) => {
                    let mut values: Vec<&str> = existing.split(';').collect();
                    if !values.contains(&v.as_str()) {
                        values.push(v);
                    }
                    let joined = values.join(";");
                    merged.insert(k.clone(), joined);
                }
                None => {
                    merged.insert(k.clone(), v.clone());
                }
            }
        }
        if &merged == self.tags() {
            return self.clone();
        }
        self.with_new_tags(merged)
    }

    /// Copy with only the version bumped
    pub fn touch(&self) -> Entity {
        self.update(|_| {})
    }
}

impl From<Node> for Entity {
    fn from(node: Node) -> Self {
        Entity::Node(node)
    }
}

impl From<Way> for Entity {
    fn from(way: Way) -> Self {
        Entity::Way(way)
    }
}

impl From<Relation> for Entity {
    fn from(relation: Relation) -> Self {
        Entity::Relation(relation)
    }
}
