//! Error types for the editor

use std::fmt;

use mapedit_graph::GraphError;
use mapedit_osm::EntityError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an action refuses to run against a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledReason {
    /// A relation member is not loaded
    IncompleteRelation,
    /// The target entity is absent
    NotFound,
    /// The target exists but the action does not apply to it
    NotEligible,
    Other(String),
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisabledReason::IncompleteRelation => f.write_str("incomplete_relation"),
            DisabledReason::NotFound => f.write_str("not_found"),
            DisabledReason::NotEligible => f.write_str("not_eligible"),
            DisabledReason::Other(reason) => f.write_str(reason),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Action disabled: {0}")]
    Disabled(DisabledReason),
}

impl From<EntityError> for EditError {
    fn from(e: EntityError) -> Self {
        EditError::Graph(GraphError::InvalidEdit(e))
    }
}

/// Which way the checkpoint cursor was asked to move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Undo => f.write_str("undo"),
            Direction::Redo => f.write_str("redo"),
        }
    }
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Nothing to {0}")]
    AtBoundary(Direction),

    #[error("Edit failed: {0}")]
    Edit(#[from] EditError),

    #[error("No transition in progress")]
    NoTransition,

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Saved history version {found} is not supported")]
    Incompatible { found: u64 },
}
