//! # Mapedit Editor
//!
//! Edit operations and undo history on top of [`mapedit_graph`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ EditOp / Action: Graph → Graph              │
//! └─────────────────────────────────────────────┘
//!                     ↓ perform / perform_transition
//! ┌─────────────────────────────────────────────┐
//! │ EditHistory                                 │
//! │  - staging graph                            │
//! │  - checkpoint stack + cursor                │
//! │  - merge of remote batches into every graph │
//! └─────────────────────────────────────────────┘
//!                     ↓ commit
//! ┌─────────────────────────────────────────────┐
//! │ Backup: autosave blob (memory or file)      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mapedit_editor::{CommitOptions, EditHistory, MoveNode};
//!
//! let mut history = EditHistory::new(graph);
//! history.perform(&[&MoveNode::new(id, [2.0, 48.0])], Some("Moved a point"))?;
//! history.commit(CommitOptions::default())?;
//!
//! history.undo()?;
//! ```

mod action;
mod actions;
mod backup;
mod config;
mod edit_op;
mod errors;
mod history;

pub use action::{clamp_progress, Action, ActionFn, Chain};
pub use actions::*;
pub use backup::{Backup, FileBackup, MemoryBackup, SavedCheckpoint, SavedHistory, AUTOSAVE_VERSION};
pub use config::HistoryConfig;
pub use edit_op::EditOp;
pub use errors::{BackupError, DisabledReason, Direction, EditError, HistoryError};
pub use history::{Checkpoint, CommitOptions, EditHistory};
