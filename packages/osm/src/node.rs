use serde::{Deserialize, Serialize};

use crate::{EntityId, EntityKind, Extent, Loc, Tags};

/// A point feature or a vertex of one or more ways
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: EntityId,

    #[serde(default)]
    pub version: u64,

    #[serde(default = "crate::entity::default_visible")]
    pub visible: bool,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,

    pub loc: Loc,
}

impl Node {
    pub fn new(id: EntityId, loc: impl Into<Loc>) -> Self {
        debug_assert_eq!(id.kind(), EntityKind::Node, "{id} is not a node id");
        Self {
            id,
            version: 0,
            visible: true,
            tags: Tags::new(),
            loc: loc.into(),
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
    pub fn update(&self, f: impl FnOnce(&mut Node)) -> Node {
        let mut next = self.clone();
        f(&mut next);
        next.id = self.id;
        next.version = self.version + 1;
        next
    }

    pub fn move_to(&self, loc: Loc) -> Node {
        self.update(|n| n.loc = loc)
    }

    pub fn extent(&self) -> Extent {
        Extent::from_point(self.loc)
    }

    pub fn is_degenerate(&self) -> bool {
        !self.loc.is_valid()
    }
}
