//! Positional edge index.
//!
//! For every concept that appears in an edge, the index keeps one bucket per
//! 1-based position holding the ids of edges with that concept at exactly
//! that position:
//!
//! ```text
//! cow ─┬─ 2 ─▶ {E1, E2}
//!      └─ 3 ─▶ {E7}
//! ```
//!
//! Buckets are copy-on-write (`Arc<HashSet<EdgeId>>`). A query clones the
//! `Arc` under the shard's read lock and works on that snapshot, so readers
//! never block on the writer holding the bucket.
//!
//! String and primitive nodes are not indexed. Constraints on them are
//! checked against the candidate edges after the set algebra.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use hashbrown::{HashMap, HashSet};

use crate::model::*;
use crate::storage::{Codec, EntityTables};
use crate::{Error, Result};
use super::{EdgeLocator, Module, ModuleOutput, QueryArg};

type Bucket = Arc<HashSet<EdgeId>>;

/// Persisted form: node → [(position, edge ids)], every level sorted.
type IndexImage = Vec<(NodeId, Vec<(u32, Vec<EdgeId>)>)>;

#[derive(Debug, Clone, Default)]
struct PositionBuckets {
    by_position: HashMap<u32, Bucket>,
}

impl PositionBuckets {
    /// Every edge containing the node at any position.
    fn union(&self) -> HashSet<EdgeId> {
        let mut all = HashSet::new();
        for bucket in self.by_position.values() {
            all.extend(bucket.iter().copied());
        }
        all
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// "The edge contains `node`", optionally at exactly `position`.
///
/// An additive constraint keeps matching edges; a subtractive one drops them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub node: Node,
    pub position: Option<u32>,
    pub additive: bool,
}

impl Constraint {
    pub fn anywhere(node: Node) -> Self {
        Self { node, position: None, additive: true }
    }

    pub fn at(node: Node, position: u32) -> Self {
        Self { node, position: Some(position), additive: true }
    }

    pub fn excluding(node: Node, position: u32) -> Self {
        Self { node, position: Some(position), additive: false }
    }

    /// Whether `edge` satisfies the node/position test, ignoring polarity.
    pub fn matches(&self, edge: &Edge) -> bool {
        match self.position {
            Some(p) => edge.node_at(p as usize) == Some(&self.node),
            None => edge.contains_node(&self.node),
        }
    }

    /// Parse `execute` arguments: each node optionally followed by one
    /// integer selector. `p > 0` pins the node to position `p`; `-p` pins it
    /// and subtracts.
    pub fn parse_args(args: &[QueryArg]) -> Result<Vec<Constraint>> {
        if args.is_empty() {
            return Err(Error::InvalidArgument("related-edge query needs at least one node".into()));
        }
        let mut constraints: Vec<Constraint> = Vec::with_capacity(args.len());
        let mut selected = false;
        for (i, arg) in args.iter().enumerate() {
            match arg {
                QueryArg::Node(node) => {
                    constraints.push(Constraint::anywhere(node.clone()));
                    selected = false;
                }
                QueryArg::Int(selector) => {
                    let Some(last) = constraints.last_mut().filter(|_| !selected) else {
                        return Err(Error::InvalidArgument(format!(
                            "selector {selector} at argument {i} does not follow a node"
                        )));
                    };
                    if *selector == 0 {
                        return Err(Error::InvalidArgument("positions are 1-based; selector 0 is invalid".into()));
                    }
                    let position = u32::try_from(selector.unsigned_abs())
                        .map_err(|_| Error::InvalidArgument(format!("selector {selector} out of range")))?;
                    last.position = Some(position);
                    last.additive = *selector > 0;
                    selected = true;
                }
                other => {
                    return Err(Error::InvalidArgument(format!(
                        "argument {i} must be a node or an integer selector, got {other:?}"
                    )));
                }
            }
        }
        Ok(constraints)
    }
}

/// A concept constraint with its located bucket.
struct Located {
    edges: Bucket,
    additive: bool,
}

// ============================================================================
// RelatedEdgeIndex
// ============================================================================

/// Concept → position → edge ids. Stores ids only; edges are resolved
/// through the tables on the way out.
pub struct RelatedEdgeIndex {
    tables: Arc<EntityTables>,
    related: DashMap<NodeId, PositionBuckets>,
}

impl RelatedEdgeIndex {
    pub const IDENTIFIER: &'static str = "dag_rs::module::RelatedEdgeIndex";

    pub fn new() -> Self {
        Self {
            tables: Arc::new(EntityTables::default()),
            related: DashMap::new(),
        }
    }

    /// Number of concepts with at least one bucket.
    pub fn indexed_nodes(&self) -> usize {
        self.related.len()
    }

    /// Positions at which `node` occurs, with bucket sizes, ascending.
    pub fn positions(&self, node: NodeId) -> Vec<(u32, usize)> {
        let Some(buckets) = self.related.get(&node) else {
            return Vec::new();
        };
        let mut out: Vec<(u32, usize)> = buckets.by_position.iter().map(|(p, b)| (*p, b.len())).collect();
        out.sort_unstable();
        out
    }

    /// Parse `args` and run the query.
    pub fn query(&self, args: &[QueryArg]) -> Result<Vec<Arc<Edge>>> {
        let constraints = Constraint::parse_args(args)?;
        Ok(self.query_constraints(&constraints))
    }

    /// Run already-parsed constraints. Results are ordered by edge id.
    pub fn query_constraints(&self, constraints: &[Constraint]) -> Vec<Arc<Edge>> {
        let mut located: Vec<Located> = constraints
            .iter()
            .filter_map(|c| {
                let id = c.node.concept_id()?;
                Some(Located { edges: self.locate(id, c.position), additive: c.additive })
            })
            .collect();
        // Additive before subtractive, smallest first.
        located.sort_by_key(|l| (!l.additive, l.edges.len()));

        let mut steps = located.into_iter();
        let seeded = matches!(steps.as_slice().first(), Some(l) if l.additive);
        let mut result: HashSet<EdgeId> = if seeded {
            steps.next().map(|l| (*l.edges).clone()).unwrap_or_default()
        } else {
            self.tables.edges.ids().into_iter().collect()
        };

        for step in steps {
            if result.is_empty() {
                return Vec::new();
            }
            if step.additive {
                result.retain(|id| step.edges.contains(id));
            } else if step.edges.len() < result.len() {
                for id in step.edges.iter() {
                    result.remove(id);
                }
            } else {
                result.retain(|id| !step.edges.contains(id));
            }
        }
        if result.is_empty() {
            return Vec::new();
        }

        let literal: Vec<&Constraint> = constraints.iter().filter(|c| !c.node.is_concept()).collect();
        let mut edges: Vec<Arc<Edge>> = result
            .into_iter()
            .filter_map(|id| self.tables.edge(id))
            .filter(|edge| literal.iter().all(|c| c.matches(edge) == c.additive))
            .collect();
        edges.sort_by_key(|e| e.id());
        edges
    }

    /// Snapshot of one bucket, or the union of all of a node's buckets.
    fn locate(&self, node: NodeId, position: Option<u32>) -> Bucket {
        let Some(buckets) = self.related.get(&node) else {
            return Bucket::default();
        };
        match position {
            Some(p) => buckets.by_position.get(&p).cloned().unwrap_or_default(),
            None => Arc::new(buckets.union()),
        }
    }

    fn index_edge(&self, edge: &Edge) {
        for (i, node) in edge.nodes().iter().enumerate() {
            let Some(id) = node.concept_id() else { continue };
            let mut buckets = self.related.entry(id).or_default();
            let bucket = buckets.by_position.entry(i as u32 + 1).or_default();
            Arc::make_mut(bucket).insert(edge.id());
        }
    }

    fn unindex_edge(&self, edge: &Edge) -> bool {
        let mut removed = false;
        for (i, node) in edge.nodes().iter().enumerate() {
            let Some(id) = node.concept_id() else { continue };
            let position = i as u32 + 1;
            let now_empty = {
                let Some(mut buckets) = self.related.get_mut(&id) else { continue };
                if let Some(bucket) = buckets.by_position.get_mut(&position) {
                    removed |= Arc::make_mut(bucket).remove(&edge.id());
                    if bucket.is_empty() {
                        buckets.by_position.remove(&position);
                    }
                }
                buckets.by_position.is_empty()
            };
            if now_empty {
                self.related.remove_if(&id, |_, b| b.by_position.is_empty());
            }
        }
        removed
    }

    /// Whether the indexed edge ids are exactly the ids of `edges` that
    /// contain at least one concept.
    fn covers(&self, edges: &[Arc<Edge>]) -> bool {
        let expected: HashSet<EdgeId> = edges
            .iter()
            .filter(|e| e.nodes().iter().any(Node::is_concept))
            .map(|e| e.id())
            .collect();
        let mut indexed = HashSet::with_capacity(expected.len());
        for entry in self.related.iter() {
            for bucket in entry.by_position.values() {
                indexed.extend(bucket.iter().copied());
            }
        }
        indexed == expected
    }

    fn image(&self) -> IndexImage {
        let mut image: IndexImage = self
            .related
            .iter()
            .map(|entry| {
                let mut positions: Vec<(u32, Vec<EdgeId>)> = entry
                    .by_position
                    .iter()
                    .map(|(p, bucket)| {
                        let mut ids: Vec<EdgeId> = bucket.iter().copied().collect();
                        ids.sort_unstable();
                        (*p, ids)
                    })
                    .collect();
                positions.sort_unstable_by_key(|(p, _)| *p);
                (*entry.key(), positions)
            })
            .collect();
        image.sort_unstable_by_key(|(id, _)| *id);
        image
    }
}

impl Default for RelatedEdgeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RelatedEdgeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Related Edges: {}", self.related.len())
    }
}

impl EdgeLocator for RelatedEdgeIndex {
    fn find_edge_by_nodes(&self, nodes: &[Node]) -> Vec<Arc<Edge>> {
        if nodes.is_empty() {
            return Vec::new();
        }
        let constraints: Vec<Constraint> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| Constraint::at(n.clone(), i as u32 + 1))
            .collect();
        let mut found = self.query_constraints(&constraints);
        found.retain(|e| e.arity() == nodes.len());
        found
    }

    fn edges_containing(&self, node: &Node) -> Vec<Arc<Edge>> {
        self.query_constraints(&[Constraint::anywhere(node.clone())])
    }
}

impl Module for RelatedEdgeIndex {
    fn name(&self) -> &str {
        "RelatedEdgeIndex"
    }

    fn attach(&mut self, tables: Arc<EntityTables>) {
        self.tables = tables;
    }

    fn as_edge_locator(&self) -> Option<&dyn EdgeLocator> {
        Some(self)
    }

    fn add_edge(&self, edge: &Arc<Edge>) -> bool {
        self.index_edge(edge);
        true
    }

    fn remove_edge(&self, edge: &Arc<Edge>) -> bool {
        self.unindex_edge(edge)
    }

    fn remove_node(&self, node: &Arc<ConceptNode>) -> bool {
        self.related.remove(&node.id()).is_some()
    }

    /// Rebuild from `edges` unless the index already covers exactly the
    /// indexable edges. A blob saved at another point in time is discarded.
    fn initialisation_complete(&self, _nodes: &[Arc<ConceptNode>], edges: &[Arc<Edge>]) {
        if self.covers(edges) {
            return;
        }
        tracing::info!(edges = edges.len(), "rebuilding related-edge index");
        self.related.clear();
        for edge in edges {
            self.index_edge(edge);
        }
    }

    fn execute(&self, args: &[QueryArg]) -> Result<ModuleOutput> {
        self.query(args).map(ModuleOutput::Edges)
    }

    fn clear(&self) {
        self.related.clear();
    }

    fn ids_only(&self) -> bool {
        true
    }

    fn save(&self, codec: Codec) -> Result<Option<Vec<u8>>> {
        codec.encode(&self.image()).map(Some)
    }

    fn load(&self, codec: Codec, bytes: &[u8]) -> Result<()> {
        let image: IndexImage = codec.decode(bytes)?;
        self.related.clear();
        for (node, positions) in image {
            let by_position = positions
                .into_iter()
                .map(|(p, ids)| (p, Arc::new(ids.into_iter().collect::<HashSet<EdgeId>>())))
                .collect();
            self.related.insert(node, PositionBuckets { by_position });
        }
        tracing::debug!(nodes = self.related.len(), "related-edge index loaded");
        Ok(())
    }
}
