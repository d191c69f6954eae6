//! # Mapedit Graph
//!
//! Persistent entity graph and the spatial index that follows it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ remote batches (Vec<Arc<Entity>>)           │
//! └─────────────────────────────────────────────┘
//!                     ↓ rebase
//! ┌─────────────────────────────────────────────┐
//! │ Graph: shared base layer + local overrides  │
//! │  - O(local edits) per snapshot              │
//! │  - derived parent indices                   │
//! └─────────────────────────────────────────────┘
//!                     ↓ Difference
//! ┌─────────────────────────────────────────────┐
//! │ Tree: grid spatial index, reconciled lazily │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Snapshots never change**: every edit returns a new [`Graph`]
//! 2. **Local edits win**: rebasing remote data never clobbers an override
//! 3. **Incomplete is a state**: a way with unloaded nodes is valid and queryable
//! 4. **Every traversal is cycle-safe**: relations may contain themselves

mod copy;
mod difference;
mod errors;
mod graph;
mod spatial;
mod tree;

pub use copy::copy_entities;
pub use difference::{Change, ChangeCounts, ChangeKind, Difference, SummaryEntry};
pub use errors::GraphError;
pub use graph::{Graph, ParentIds};
pub use spatial::SpatialIndex;
pub use tree::{Segment, Tree, TreeConfig};
