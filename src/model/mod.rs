//! # Entity Model
//!
//! The values that cross every boundary: store ↔ modules ↔ callers.
//!
//! Design rule: pure data. No I/O and no store access here; resolving a
//! `NodeKey::Concept` to a live node is the store's job.

pub mod node;
pub mod edge;
pub mod entity;
pub mod primitive;
pub mod property_map;

pub use node::{Node, NodeId, NodeKey, ConceptNode, StringNode, PrimitiveNode};
pub use edge::{Edge, EdgeId, EdgeNodes, EdgeOutcome};
pub use entity::Entity;
pub use primitive::{Primitive, PRIMITIVE_MARKER};
pub use property_map::PropertyMap;
