//! Hyperedges: ordered, fixed-arity node tuples.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{Node, NodeKey, PropertyMap};

/// Durable edge identifier. Assigned monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node sequence of an edge. Most assertions are binary or ternary.
pub type EdgeNodes = SmallVec<[Node; 4]>;

/// An assertion such as `(isa Cow Mammal)`.
///
/// The first node is conventionally the relation. Table identity is the id;
/// deduplication identity is the exact node sequence, which the store
/// enforces at creation time.
#[derive(Debug)]
pub struct Edge {
    id: EdgeId,
    nodes: EdgeNodes,
    creator: Option<NodeKey>,
    properties: RwLock<PropertyMap>,
}

impl Edge {
    pub fn new(id: EdgeId, nodes: impl IntoIterator<Item = Node>, creator: Option<NodeKey>) -> Self {
        Self {
            id,
            nodes: nodes.into_iter().collect(),
            creator,
            properties: RwLock::new(PropertyMap::new()),
        }
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = RwLock::new(properties);
        self
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn arity(&self) -> usize {
        self.nodes.len()
    }

    /// The first node, conventionally the relation.
    pub fn relation(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Node at a 1-based position.
    pub fn node_at(&self, position: usize) -> Option<&Node> {
        position.checked_sub(1).and_then(|i| self.nodes.get(i))
    }

    pub fn contains_node(&self, node: &Node) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    /// True if this edge has exactly the given node sequence.
    pub fn has_nodes(&self, nodes: &[Node]) -> bool {
        self.nodes.as_slice() == nodes
    }

    pub fn creator(&self) -> Option<&NodeKey> {
        self.creator.as_ref()
    }

    pub fn keys(&self) -> Vec<NodeKey> {
        self.nodes.iter().map(Node::key).collect()
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.properties.read().get(key).cloned()
    }

    pub fn properties(&self) -> PropertyMap {
        self.properties.read().clone()
    }

    pub(crate) fn put_property(&self, key: &str, value: &str) -> Option<String> {
        self.properties.write().insert(key.to_string(), value.to_string())
    }

    pub(crate) fn take_property(&self, key: &str) -> Option<String> {
        self.properties.write().remove(key)
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Edge {}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, n) in self.nodes.iter().enumerate() {
            if i > 0 { write!(f, " ")?; }
            write!(f, "{n}")?;
        }
        write!(f, ")")
    }
}

// ============================================================================
// EdgeOutcome
// ============================================================================

/// Result of `GraphStore::find_or_create_edge`.
///
/// `NonExistentNode` is the integrity sentinel: an argument concept is not
/// in the store and node creation was not allowed.
#[derive(Debug, Clone)]
pub enum EdgeOutcome {
    Existing(Arc<Edge>),
    Created(Arc<Edge>),
    NonExistentNode(Node),
}

impl EdgeOutcome {
    pub fn edge(&self) -> Option<&Arc<Edge>> {
        match self {
            EdgeOutcome::Existing(e) | EdgeOutcome::Created(e) => Some(e),
            EdgeOutcome::NonExistentNode(_) => None,
        }
    }

    pub fn into_edge(self) -> Option<Arc<Edge>> {
        match self {
            EdgeOutcome::Existing(e) | EdgeOutcome::Created(e) => Some(e),
            EdgeOutcome::NonExistentNode(_) => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, EdgeOutcome::Created(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EdgeOutcome::NonExistentNode(_))
    }
}
