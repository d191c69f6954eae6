//! # Edit operations
//!
//! Serializable descriptions of the representative actions. An edit script
//! (a JSON array of these) can be stored, sent, or replayed; each operation
//! converts into the [`Action`] that performs it.
//!
//! ```json
//! {"type": "move_node", "id": "n1", "to": {"lon": 2.0, "lat": 3.0}}
//! ```

use mapedit_graph::Graph;
use mapedit_osm::{Entity, EntityId, Loc, Member, Node, Tags};
use serde::{Deserialize, Serialize};

use crate::actions::{
    AcceptFeature, AddEntity, AddMember, AddMidpoint, ChangeTags, CopyEntities, DeleteMultiple, DeleteNode,
    DeleteRelation, DeleteWay, MoveNode, Noop,
};
use crate::Action;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditOp {
    Noop,

    AddEntity {
        entity: Entity,
    },

    ChangeTags {
        id: EntityId,
        tags: Tags,
    },

    MoveNode {
        id: EntityId,
        to: Loc,
    },

    /// Insert `node` between `a` and `b` in every way that has that edge
    AddMidpoint {
        a: EntityId,
        b: EntityId,
        node: Node,
    },

    AddMember {
        relation: EntityId,
        member: Member,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },

    DeleteNode {
        id: EntityId,
    },

    DeleteWay {
        id: EntityId,
    },

    DeleteRelation {
        id: EntityId,
    },

    DeleteMultiple {
        ids: Vec<EntityId>,
    },

    CopyEntities {
        ids: Vec<EntityId>,
        #[serde(default)]
        offset: [f64; 2],
    },

    /// Accept `id` from the foreign entities listed alongside it
    AcceptFeature {
        id: EntityId,
        foreign: Vec<Entity>,
    },
}

impl EditOp {
    pub fn name(&self) -> &'static str {
        match self {
            EditOp::Noop => "noop",
            EditOp::AddEntity { .. } => "add_entity",
            EditOp::ChangeTags { .. } => "change_tags",
            EditOp::MoveNode { .. } => "move_node",
            EditOp::AddMidpoint { .. } => "add_midpoint",
            EditOp::AddMember { .. } => "add_member",
            EditOp::DeleteNode { .. } => "delete_node",
            EditOp::DeleteWay { .. } => "delete_way",
            EditOp::DeleteRelation { .. } => "delete_relation",
            EditOp::DeleteMultiple { .. } => "delete_multiple",
            EditOp::CopyEntities { .. } => "copy_entities",
            EditOp::AcceptFeature { .. } => "accept_feature",
        }
    }

    pub fn into_action(self) -> Box<dyn Action> {
        match self {
            EditOp::Noop => Box::new(Noop),
            EditOp::AddEntity { entity } => Box::new(AddEntity::new(entity)),
            EditOp::ChangeTags { id, tags } => Box::new(ChangeTags { id, tags }),
            EditOp::MoveNode { id, to } => Box::new(MoveNode { id, to }),
            EditOp::AddMidpoint { a, b, node } => Box::new(AddMidpoint::new((a, b), node)),
            EditOp::AddMember { relation, member, index } => Box::new(AddMember { relation, member, index }),
            EditOp::DeleteNode { id } => Box::new(DeleteNode(id)),
            EditOp::DeleteWay { id } => Box::new(DeleteWay(id)),
            EditOp::DeleteRelation { id } => Box::new(DeleteRelation(id)),
            EditOp::DeleteMultiple { ids } => Box::new(DeleteMultiple(ids)),
            EditOp::CopyEntities { ids, offset } => Box::new(CopyEntities::new(ids, offset)),
            EditOp::AcceptFeature { id, foreign } => Box::new(AcceptFeature::new(id, Graph::from_base(foreign))),
        }
    }
}

impl From<EditOp> for Box<dyn Action> {
    fn from(op: EditOp) -> Self {
        op.into_action()
    }
}
