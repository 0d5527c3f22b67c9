//! Persisted forms of table entities.
//!
//! Live entities hold `Arc`s and locks; records hold plain values. Node
//! references inside records are `NodeKey`s, resolved against the loaded
//! node table when edges are rebuilt.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::*;
use super::EntityTable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: Option<String>,
    pub creator: Option<NodeKey>,
    pub properties: PropertyMap,
}

impl From<&ConceptNode> for NodeRecord {
    fn from(node: &ConceptNode) -> Self {
        Self {
            id: node.id(),
            name: node.name().map(str::to_string),
            creator: node.creator().cloned(),
            properties: node.properties(),
        }
    }
}

impl NodeRecord {
    pub fn into_node(self) -> ConceptNode {
        ConceptNode::new(self.id, self.name, self.creator).with_properties(self.properties)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub nodes: Vec<NodeKey>,
    pub creator: Option<NodeKey>,
    pub properties: PropertyMap,
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            id: edge.id(),
            nodes: edge.keys(),
            creator: edge.creator().cloned(),
            properties: edge.properties(),
        }
    }
}

impl EdgeRecord {
    /// Rebuild the edge against a node table.
    ///
    /// Returns the first concept id that no longer resolves on failure.
    pub fn resolve(self, nodes: &EntityTable<ConceptNode>) -> std::result::Result<Edge, NodeId> {
        let mut resolved = EdgeNodes::with_capacity(self.nodes.len());
        for key in &self.nodes {
            let node = match key {
                NodeKey::Concept(id) => Node::Concept(nodes.get(*id).ok_or(*id)?),
                NodeKey::Str(s) => Node::string(s.clone()),
                NodeKey::Primitive(p) => Node::primitive(*p),
            };
            resolved.push(node);
        }
        Ok(Edge::new(self.id, resolved, self.creator).with_properties(self.properties))
    }
}

/// Records for a whole table snapshot.
pub fn node_records(nodes: &[Arc<ConceptNode>]) -> Vec<NodeRecord> {
    nodes.iter().map(|n| NodeRecord::from(n.as_ref())).collect()
}

pub fn edge_records(edges: &[Arc<Edge>]) -> Vec<EdgeRecord> {
    edges.iter().map(|e| EdgeRecord::from(e.as_ref())).collect()
}
