//! Store configuration.

use std::path::PathBuf;

use crate::module::{NodeAliasIndex, RelatedEdgeIndex};
use crate::storage::Codec;

pub const DEFAULT_NODE_CAPACITY: usize = 100_000;
pub const DEFAULT_EDGE_CAPACITY: usize = 1_000_000;
pub const DEFAULT_RANDOM_RETRIES: usize = 64;

/// How a `GraphStore` is opened.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Persistence root. `None` keeps everything in memory.
    pub root: Option<PathBuf>,

    /// Table pre-sizing hints.
    pub initial_node_capacity: usize,
    pub initial_edge_capacity: usize,

    /// Identifiers written to a freshly created module-list file.
    pub modules: Vec<String>,

    pub codec: Codec,

    /// Skip the node-existence check when creating edges.
    pub no_checks: bool,

    /// Rejection-sampling draws before `random_node`/`random_edge` fall
    /// back to picking from the live ids.
    pub random_retries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: None,
            initial_node_capacity: DEFAULT_NODE_CAPACITY,
            initial_edge_capacity: DEFAULT_EDGE_CAPACITY,
            modules: vec![
                RelatedEdgeIndex::IDENTIFIER.to_string(),
                NodeAliasIndex::IDENTIFIER.to_string(),
            ],
            codec: Codec::default(),
            no_checks: false,
            random_retries: DEFAULT_RANDOM_RETRIES,
        }
    }
}

impl StoreConfig {
    /// Memory-only store with the default modules.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store persisted under `root`.
    pub fn persistent(root: impl Into<PathBuf>) -> Self {
        Self::default().with_root(root)
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_capacity(mut self, nodes: usize, edges: usize) -> Self {
        self.initial_node_capacity = nodes;
        self.initial_edge_capacity = edges;
        self
    }

    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = modules.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_no_checks(mut self, no_checks: bool) -> Self {
        self.no_checks = no_checks;
        self
    }

    pub fn with_random_retries(mut self, retries: usize) -> Self {
        self.random_retries = retries;
        self
    }
}
