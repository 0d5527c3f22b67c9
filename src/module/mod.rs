//! # Module Framework
//!
//! Modules are the extension point of the store. Each one keeps a private,
//! derived index over the node and edge tables and keeps it current through
//! lifecycle hooks that the store fires, synchronously and in registration
//! order, after every table mutation.
//!
//! | Module | Identifier | Capability |
//! |--------|------------|------------|
//! | `RelatedEdgeIndex` | `dag_rs::module::RelatedEdgeIndex` | `RelatedEdges` |
//! | `NodeAliasIndex` | `dag_rs::module::NodeAliasIndex` | `AliasResolution` |
//!
//! ## Hook contract
//!
//! - Hooks run inside the store's writer lock; a slow hook stalls writers.
//! - `add_node` / `add_edge` return values are advisory. The store logs a
//!   `false` but never rolls the insertion back.
//! - `clear()` must drop all derived state.
//! - `save` / `load` persist the module to its own slot, keyed by `name()`.
//!   A module that reports `ids_only()` stores bare ids and resolves them
//!   back through the tables it was attached to.

pub mod registry;
pub mod related_edge;
pub mod node_alias;

use std::any::Any;
use std::sync::Arc;

use crate::model::*;
use crate::storage::{Codec, EntityTables};
use crate::Result;

pub use registry::{ModuleCatalog, ModuleFactory, ModuleRegistry};
pub use related_edge::{Constraint, RelatedEdgeIndex};
pub use node_alias::NodeAliasIndex;

// ============================================================================
// Type erasure
// ============================================================================

/// Downcasting support for registered modules.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Interfaces a module can expose to the store, independent of its type.
///
/// The store looks collaborators up by capability, so a custom module can
/// stand in for a built-in one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Resolves concept names to nodes.
    AliasResolution,
    /// Finds edges by the nodes they contain.
    RelatedEdges,
}

/// Name lookup consumed by `find_or_create_node`.
pub trait AliasResolver: Send + Sync {
    /// Concepts called `name`. `exact` means case-sensitive.
    fn find_node_by_name(&self, name: &str, exact: bool) -> Vec<Arc<ConceptNode>>;
}

/// Edge lookup consumed by edge find-or-create and node removal.
pub trait EdgeLocator: Send + Sync {
    /// Edges whose node sequence is exactly `nodes`.
    fn find_edge_by_nodes(&self, nodes: &[Node]) -> Vec<Arc<Edge>>;

    /// Every edge that contains `node` at any position.
    fn edges_containing(&self, node: &Node) -> Vec<Arc<Edge>>;
}

// ============================================================================
// Query arguments and results
// ============================================================================

/// One positional argument to `Module::execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    Node(Node),
    Int(i64),
    Text(String),
    Bool(bool),
}

impl From<Node> for QueryArg { fn from(v: Node) -> Self { QueryArg::Node(v) } }
impl From<&Node> for QueryArg { fn from(v: &Node) -> Self { QueryArg::Node(v.clone()) } }
impl From<Arc<ConceptNode>> for QueryArg { fn from(v: Arc<ConceptNode>) -> Self { QueryArg::Node(Node::Concept(v)) } }
impl From<&Arc<ConceptNode>> for QueryArg { fn from(v: &Arc<ConceptNode>) -> Self { QueryArg::Node(v.into()) } }
impl From<StringNode> for QueryArg { fn from(v: StringNode) -> Self { QueryArg::Node(v.into()) } }
impl From<PrimitiveNode> for QueryArg { fn from(v: PrimitiveNode) -> Self { QueryArg::Node(v.into()) } }
impl From<i32> for QueryArg { fn from(v: i32) -> Self { QueryArg::Int(v as i64) } }
impl From<i64> for QueryArg { fn from(v: i64) -> Self { QueryArg::Int(v) } }
impl From<&str> for QueryArg { fn from(v: &str) -> Self { QueryArg::Text(v.to_owned()) } }
impl From<String> for QueryArg { fn from(v: String) -> Self { QueryArg::Text(v) } }
impl From<bool> for QueryArg { fn from(v: bool) -> Self { QueryArg::Bool(v) } }

/// Build a `Vec<QueryArg>` from mixed nodes and selectors.
///
/// ```rust
/// # use dag_rs::{args, Node};
/// let a = args![Node::string("x"), 2];
/// assert_eq!(a.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::module::QueryArg::from($arg)),*]
    };
}

/// Result of `Module::execute`.
#[derive(Debug, Clone)]
pub enum ModuleOutput {
    Edges(Vec<Arc<Edge>>),
    Nodes(Vec<Arc<ConceptNode>>),
    Count(usize),
}

impl ModuleOutput {
    pub fn len(&self) -> usize {
        match self {
            ModuleOutput::Edges(e) => e.len(),
            ModuleOutput::Nodes(n) => n.len(),
            ModuleOutput::Count(c) => *c,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_edges(self) -> Option<Vec<Arc<Edge>>> {
        match self {
            ModuleOutput::Edges(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_nodes(self) -> Option<Vec<Arc<ConceptNode>>> {
        match self {
            ModuleOutput::Nodes(n) => Some(n),
            _ => None,
        }
    }
}

// ============================================================================
// Module trait
// ============================================================================

/// The extension contract.
///
/// Hooks take `&self`: modules are shared with concurrent readers and keep
/// their state in concurrent structures. Everything except `name` and
/// `execute` has a no-op default.
pub trait Module: AsAny {
    /// Persistence slot and log name. Stable across releases.
    fn name(&self) -> &str;

    /// Receive the tables before registration.
    fn attach(&mut self, _tables: Arc<EntityTables>) {}

    fn as_alias_resolver(&self) -> Option<&dyn AliasResolver> {
        None
    }

    fn as_edge_locator(&self) -> Option<&dyn EdgeLocator> {
        None
    }

    /// Called after a concept is inserted. Return false to request rejection
    /// (advisory only).
    fn add_node(&self, _node: &Arc<ConceptNode>) -> bool {
        true
    }

    /// Called after an edge is inserted. Return false to request rejection
    /// (advisory only).
    fn add_edge(&self, _edge: &Arc<Edge>) -> bool {
        true
    }

    /// Called after a concept and all its edges are removed.
    fn remove_node(&self, _node: &Arc<ConceptNode>) -> bool {
        false
    }

    /// Called after an edge is removed.
    fn remove_edge(&self, _edge: &Arc<Edge>) -> bool {
        false
    }

    fn add_property(&self, _entity: &Entity, _key: &str, _value: &str) {}

    fn remove_property(&self, _entity: &Entity, _key: &str) {}

    /// Called once loading finishes with the full tables, so derived state
    /// that is missing or out of date can be rebuilt.
    fn initialisation_complete(&self, _nodes: &[Arc<ConceptNode>], _edges: &[Arc<Edge>]) {}

    /// Module-specific query.
    fn execute(&self, args: &[QueryArg]) -> Result<ModuleOutput>;

    fn clear(&self) {}

    /// Whether `save` writes bare ids rather than full entities.
    fn ids_only(&self) -> bool {
        false
    }

    /// Serialize derived state. `Ok(None)` means nothing to persist.
    fn save(&self, _codec: Codec) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    /// Replace derived state from a blob written by `save`.
    fn load(&self, _codec: Codec, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

impl dyn Module {
    pub fn provides(&self, capability: Capability) -> bool {
        match capability {
            Capability::AliasResolution => self.as_alias_resolver().is_some(),
            Capability::RelatedEdges => self.as_edge_locator().is_some(),
        }
    }
}
