//! Representative actions over the entity graph

mod accept_feature;
mod add_midpoint;
mod basic;
mod copy;
mod delete;
mod move_node;

pub use accept_feature::{AcceptFeature, DUPLICATE_EPSILON};
pub use add_midpoint::AddMidpoint;
pub use basic::{AddEntity, AddMember, ChangeTags, Noop};
pub use copy::CopyEntities;
pub use delete::{DeleteMultiple, DeleteNode, DeleteRelation, DeleteWay};
pub use move_node::MoveNode;
