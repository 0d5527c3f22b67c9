//! # dag-rs: Embeddable Hypergraph Store
//!
//! Concepts, string literals and primitive values connected by ordered
//! edges of any arity ("isa Cow Mammal"), with a module framework for
//! building derived indices over the same tables.
//!
//! ## Design Principles
//!
//! 1. **Closed node model**: `Node` is an enum over concept, string and
//!    primitive; only concepts have ids and live in a table
//! 2. **One writer, many readers**: mutations serialize on a single lock;
//!    id lookups and module queries read concurrently
//! 3. **Modules by injection**: modules receive the shared tables when they
//!    are attached and never reach back into the store
//! 4. **Capabilities, not types**: the store finds its collaborators
//!    (alias resolution, related-edge lookup) by capability
//!
//! ## Quick Start
//!
//! ```rust
//! use dag_rs::{args, GraphStore, RelatedEdgeIndex};
//!
//! # fn example() -> dag_rs::Result<()> {
//! let store = GraphStore::in_memory();
//! let nodes = store.parse_nodes("(isa Cow Mammal)", None, true, false).unwrap();
//! let edge = store.find_or_create_edge(None, false, &nodes)?;
//! assert!(edge.is_created());
//!
//! let index = store.get_module::<RelatedEdgeIndex>().unwrap();
//! let cow = &nodes[1];
//! assert_eq!(index.query(&args![cow, 2])?.len(), 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Built-in Modules
//!
//! | Module | Capability | Description |
//! |--------|------------|-------------|
//! | `RelatedEdgeIndex` | `RelatedEdges` | concept → position → edges, set-algebraic queries |
//! | `NodeAliasIndex` | `AliasResolution` | name → concepts, exact or case-insensitive |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod module;
pub mod graph;
pub mod config;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Node, NodeId, NodeKey, ConceptNode, StringNode, PrimitiveNode, Primitive,
    Edge, EdgeId, EdgeOutcome, Entity, PropertyMap,
};

// ============================================================================
// Re-exports: Store, modules, config
// ============================================================================

pub use graph::GraphStore;
pub use module::{
    Capability, Module, ModuleCatalog, ModuleOutput, QueryArg,
    AliasResolver, EdgeLocator, Constraint, RelatedEdgeIndex, NodeAliasIndex,
};
pub use config::StoreConfig;
pub use storage::Codec;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Module error: {0}")]
    Module(String),

    #[error("Module already registered: {0}")]
    ModuleExists(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
