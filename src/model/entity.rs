//! Entity: a handle to anything that lives in a store table.

use std::sync::Arc;

use super::{ConceptNode, Edge, PropertyMap};

/// A table-resident object: a concept or an edge.
///
/// Property mutations and module property hooks take this, so a single
/// code path serves both tables.
#[derive(Debug, Clone)]
pub enum Entity {
    Node(Arc<ConceptNode>),
    Edge(Arc<Edge>),
}

impl Entity {
    pub fn property(&self, key: &str) -> Option<String> {
        match self {
            Entity::Node(n) => n.property(key),
            Entity::Edge(e) => e.property(key),
        }
    }

    pub fn properties(&self) -> PropertyMap {
        match self {
            Entity::Node(n) => n.properties(),
            Entity::Edge(e) => e.properties(),
        }
    }

    /// Short tag used by the line protocol: `N` or `E`.
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Node(_) => "N",
            Entity::Edge(_) => "E",
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Entity::Node(n) => n.id().0,
            Entity::Edge(e) => e.id().0,
        }
    }

    pub(crate) fn put_property(&self, key: &str, value: &str) -> Option<String> {
        match self {
            Entity::Node(n) => n.put_property(key, value),
            Entity::Edge(e) => e.put_property(key, value),
        }
    }

    pub(crate) fn take_property(&self, key: &str) -> Option<String> {
        match self {
            Entity::Node(n) => n.take_property(key),
            Entity::Edge(e) => e.take_property(key),
        }
    }
}

impl From<Arc<ConceptNode>> for Entity {
    fn from(n: Arc<ConceptNode>) -> Self { Entity::Node(n) }
}

impl From<&Arc<ConceptNode>> for Entity {
    fn from(n: &Arc<ConceptNode>) -> Self { Entity::Node(Arc::clone(n)) }
}

impl From<Arc<Edge>> for Entity {
    fn from(e: Arc<Edge>) -> Self { Entity::Edge(e) }
}

impl From<&Arc<Edge>> for Entity {
    fn from(e: &Arc<Edge>) -> Self { Entity::Edge(Arc::clone(e)) }
}
