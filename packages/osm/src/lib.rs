//! # Mapedit OSM
//!
//! The entity model shared by every layer of the editor.
//!
//! - [`EntityId`]: kind + signed number, negative for client-created entities
//! - [`Node`], [`Way`], [`Relation`] and the [`Entity`] enum over them
//! - [`Loc`] / [`Extent`]: the geometry primitives the spatial index works in
//!
//! Entities are immutable values. Every helper that "changes" one returns a
//! new value with `version + 1`:
//!
//! ```rust
//! use mapedit_osm::{EntityId, Loc, Node};
//!
//! let node = Node::new(EntityId::node(1), [0.0, 0.0]);
//! let moved = node.move_to(Loc::new(2.0, 3.0));
//!
//! assert_eq!(node.loc, Loc::new(0.0, 0.0));
//! assert_eq!(moved.version, node.version + 1);
//! ```

mod entity;
mod errors;
mod geo;
mod id;
mod node;
mod relation;
mod tags;
mod way;

pub use entity::Entity;
pub use errors::EntityError;
pub use geo::{Extent, Loc};
pub use id::{EntityId, EntityKind, NextIds};
pub use node::Node;
pub use relation::{Member, Relation};
pub use tags::{has_interesting_tags, is_interesting_tag, tags, Tags};
pub use way::Way;
