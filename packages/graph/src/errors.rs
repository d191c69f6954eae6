//! Error types for graph lookups and edits

use mapedit_osm::{EntityError, EntityId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Entity {0} not found")]
    NotFound(EntityId),

    #[error("Invalid edit: {0}")]
    InvalidEdit(#[from] EntityError),
}
