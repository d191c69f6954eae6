//! Error types for entity edits

use thiserror::Error;

use crate::{EntityId, EntityKind};

/// A precondition of an entity edit was violated
///
/// These indicate a bug in whoever built the edit, so they are surfaced
/// immediately rather than coerced into a no-op.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntityError {
    #[error("Node {node} is not part of way {way}")]
    NodeNotInWay { way: EntityId, node: EntityId },

    #[error("Index {index} out of range 0..{max} on {id}")]
    IndexOutOfRange { id: EntityId, index: usize, max: usize },

    #[error("Expected a {expected}, {id} is a {}", .id.kind())]
    WrongKind { id: EntityId, expected: EntityKind },

    #[error("Invalid entity id: {0:?}")]
    InvalidId(String),
}
