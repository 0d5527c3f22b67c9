//! Nodes of the hypergraph.
//!
//! `Node` is a closed variant over the three kinds of thing an edge can
//! point at: interned concepts with durable ids, quoted string literals,
//! and primitive scalars. Only concepts live in the node table; literals
//! are value-typed and may exist as any number of equal instances.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{Primitive, PropertyMap, PRIMITIVE_MARKER};

/// Durable concept identifier. Assigned monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ConceptNode
// ============================================================================

/// A concept: the only node kind with an identity of its own.
///
/// Two concepts with the same name are the same object; the store hands out
/// shared `Arc<ConceptNode>` handles and never builds a second instance for
/// a name it already knows.
#[derive(Debug)]
pub struct ConceptNode {
    id: NodeId,
    name: Option<String>,
    creator: Option<NodeKey>,
    properties: RwLock<PropertyMap>,
}

impl ConceptNode {
    pub fn new(id: NodeId, name: Option<String>, creator: Option<NodeKey>) -> Self {
        Self {
            id,
            name,
            creator,
            properties: RwLock::new(PropertyMap::new()),
        }
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = RwLock::new(properties);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The concept name. Anonymous concepts have none.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn creator(&self) -> Option<&NodeKey> {
        self.creator.as_ref()
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.properties.read().get(key).cloned()
    }

    /// Snapshot of the property map.
    pub fn properties(&self) -> PropertyMap {
        self.properties.read().clone()
    }

    pub(crate) fn put_property(&self, key: &str, value: &str) -> Option<String> {
        self.properties.write().insert(key.to_string(), value.to_string())
    }

    pub(crate) fn take_property(&self, key: &str) -> Option<String> {
        self.properties.write().remove(key)
    }

    /// Text that resolves back to this concept through the store (its id).
    pub fn identifier(&self) -> String {
        self.id.to_string()
    }
}

impl PartialEq for ConceptNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConceptNode {}

impl Hash for ConceptNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ConceptNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}", self.id),
        }
    }
}

// ============================================================================
// Literal nodes
// ============================================================================

/// A quoted string literal. Compared and hashed by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringNode {
    value: String,
}

impl StringNode {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    /// Build from quoted text, stripping any number of surrounding quote pairs.
    pub fn parse(text: &str) -> Self {
        let mut s = text;
        while s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
            s = &s[1..s.len() - 1];
        }
        Self::new(s)
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for StringNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.value)
    }
}

/// A primitive scalar literal. Compared and hashed by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimitiveNode {
    value: Primitive,
}

impl PrimitiveNode {
    pub fn new(value: impl Into<Primitive>) -> Self {
        Self { value: value.into() }
    }

    /// Parse the text following the primitive marker.
    pub fn parse(text: &str) -> Option<Self> {
        Primitive::parse(text).map(|value| Self { value })
    }

    pub fn value(&self) -> Primitive {
        self.value
    }
}

impl fmt::Display for PrimitiveNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

// ============================================================================
// Node
// ============================================================================

/// Anything that can appear in an edge.
#[derive(Debug, Clone)]
pub enum Node {
    Concept(Arc<ConceptNode>),
    Str(StringNode),
    Primitive(PrimitiveNode),
}

impl Node {
    pub fn string(value: impl Into<String>) -> Self {
        Node::Str(StringNode::new(value))
    }

    pub fn primitive(value: impl Into<Primitive>) -> Self {
        Node::Primitive(PrimitiveNode::new(value))
    }

    pub fn is_concept(&self) -> bool {
        matches!(self, Node::Concept(_))
    }

    pub fn as_concept(&self) -> Option<&Arc<ConceptNode>> {
        match self {
            Node::Concept(c) => Some(c),
            _ => None,
        }
    }

    pub fn concept_id(&self) -> Option<NodeId> {
        self.as_concept().map(|c| c.id())
    }

    /// Value-form reference used for persistence and creator links.
    pub fn key(&self) -> NodeKey {
        match self {
            Node::Concept(c) => NodeKey::Concept(c.id()),
            Node::Str(s) => NodeKey::Str(s.value().to_string()),
            Node::Primitive(p) => NodeKey::Primitive(p.value()),
        }
    }

    /// Text the store parses back into an equal node.
    pub fn identifier(&self) -> String {
        match self {
            Node::Concept(c) => c.identifier(),
            Node::Str(s) => s.to_string(),
            Node::Primitive(p) => format!("{PRIMITIVE_MARKER}{p}"),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Concept(a), Node::Concept(b)) => a.id() == b.id(),
            (Node::Str(a), Node::Str(b)) => a == b,
            (Node::Primitive(a), Node::Primitive(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Node::Concept(c) => c.id().hash(state),
            Node::Str(s) => s.hash(state),
            Node::Primitive(p) => p.hash(state),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Concept(c) => write!(f, "{c}"),
            Node::Str(s) => write!(f, "{s}"),
            Node::Primitive(p) => write!(f, "{p}"),
        }
    }
}

impl From<Arc<ConceptNode>> for Node {
    fn from(c: Arc<ConceptNode>) -> Self { Node::Concept(c) }
}

impl From<&Arc<ConceptNode>> for Node {
    fn from(c: &Arc<ConceptNode>) -> Self { Node::Concept(Arc::clone(c)) }
}

impl From<StringNode> for Node {
    fn from(s: StringNode) -> Self { Node::Str(s) }
}

impl From<PrimitiveNode> for Node {
    fn from(p: PrimitiveNode) -> Self { Node::Primitive(p) }
}

// ============================================================================
// NodeKey
// ============================================================================

/// A node by value: concepts by id, literals by content.
///
/// This is what tables, module blobs and creator links store. Resolving a
/// `NodeKey::Concept` back to a live node goes through the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKey {
    Concept(NodeId),
    Str(String),
    Primitive(Primitive),
}

impl NodeKey {
    /// Materialize a literal key. Concept keys need the store and yield `None`.
    pub fn literal(&self) -> Option<Node> {
        match self {
            NodeKey::Concept(_) => None,
            NodeKey::Str(s) => Some(Node::string(s.clone())),
            NodeKey::Primitive(p) => Some(Node::primitive(*p)),
        }
    }
}

impl From<&Node> for NodeKey {
    fn from(node: &Node) -> Self { node.key() }
}
