//! On-disk layout of a store root directory.
//!
//! ```text
//! <root>/
//!   nodes.dat               node table (codec-encoded NodeRecords)
//!   edges.dat               edge table (codec-encoded EdgeRecords)
//!   dagDetails              globals: counts and id counters, key=value
//!   activeModules.config    one module identifier per line
//!   modules/<name>          one blob per registered module
//! ```
//!
//! Line-oriented files treat lines starting with `%` as comments.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::Result;
use super::codec::write_atomic;

pub const NODE_FILE: &str = "nodes.dat";
pub const EDGE_FILE: &str = "edges.dat";
pub const GLOBALS_FILE: &str = "dagDetails";
pub const MODULE_LIST_FILE: &str = "activeModules.config";
pub const MODULE_DIR: &str = "modules";

const NUM_NODES_FIELD: &str = "numNodes";
const NODE_ID_FIELD: &str = "nodeID";
const NUM_EDGES_FIELD: &str = "numEdges";
const EDGE_ID_FIELD: &str = "edgeID";

const COMMENT: char = '%';

/// Paths under a store root.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn node_file(&self) -> PathBuf {
        self.root.join(NODE_FILE)
    }

    pub fn edge_file(&self) -> PathBuf {
        self.root.join(EDGE_FILE)
    }

    pub fn globals_file(&self) -> PathBuf {
        self.root.join(GLOBALS_FILE)
    }

    pub fn module_list_file(&self) -> PathBuf {
        self.root.join(MODULE_LIST_FILE)
    }

    pub fn module_file(&self, module_name: &str) -> PathBuf {
        self.root.join(MODULE_DIR).join(module_name)
    }
}

// ============================================================================
// Globals
// ============================================================================

/// Counts and id counters recorded alongside the tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Globals {
    pub num_nodes: usize,
    pub node_id: u64,
    pub num_edges: usize,
    pub edge_id: u64,
}

impl Globals {
    /// Parse `key=value` lines. Unknown keys and malformed values are skipped.
    pub fn parse(text: &str) -> Self {
        let mut globals = Globals::default();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with(COMMENT) {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else { continue };
            let value = value.trim();
            match key.trim() {
                NUM_NODES_FIELD => globals.num_nodes = value.parse().unwrap_or(globals.num_nodes),
                NODE_ID_FIELD => globals.node_id = value.parse().unwrap_or(globals.node_id),
                NUM_EDGES_FIELD => globals.num_edges = value.parse().unwrap_or(globals.num_edges),
                EDGE_ID_FIELD => globals.edge_id = value.parse().unwrap_or(globals.edge_id),
                other => tracing::debug!(key = other, "ignoring unknown globals key"),
            }
        }
        globals
    }

    pub fn render(&self) -> String {
        format!(
            "% Do not change the contents of this file unless you know what you're doing!\n\
             % Saved {}\n\
             {NUM_NODES_FIELD}={}\n\
             {NODE_ID_FIELD}={}\n\
             {NUM_EDGES_FIELD}={}\n\
             {EDGE_ID_FIELD}={}\n",
            Utc::now().to_rfc3339(),
            self.num_nodes,
            self.node_id,
            self.num_edges,
            self.edge_id,
        )
    }

    pub fn read(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(Self::parse(&text))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.render().as_bytes())
    }
}

// ============================================================================
// Module list
// ============================================================================

/// Parse a module list: one identifier per non-comment, non-blank line.
pub fn parse_module_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(COMMENT))
        .map(str::to_string)
        .collect()
}

pub fn render_module_list(modules: &[String]) -> String {
    let mut out = String::from(
        "% Put the utilised modules here. One per line, by identifier.\n\
         % E.g.:\n\
         % dag_rs::module::RelatedEdgeIndex\n",
    );
    for m in modules {
        out.push_str(m);
        out.push('\n');
    }
    out
}

/// Read the module list, creating it from `defaults` when absent.
pub fn read_or_create_module_list(path: &Path, defaults: &[String]) -> Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(parse_module_list(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            write_atomic(path, render_module_list(defaults).as_bytes())?;
            tracing::info!(path = %path.display(), "created module list");
            Ok(defaults.to_vec())
        }
        Err(e) => Err(e.into()),
    }
}
