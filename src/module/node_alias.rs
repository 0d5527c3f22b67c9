//! Name → concept index.
//!
//! Two maps are kept: one keyed by the exact name and one keyed by its
//! lowercase fold. Both hold ids only.

use std::sync::Arc;

use dashmap::DashMap;

use crate::model::*;
use crate::storage::{Codec, EntityTables};
use crate::{Error, Result};
use super::{AliasResolver, Module, ModuleOutput, QueryArg};

type AliasImage = Vec<(String, Vec<NodeId>)>;

pub struct NodeAliasIndex {
    tables: Arc<EntityTables>,
    exact: DashMap<String, Vec<NodeId>>,
    folded: DashMap<String, Vec<NodeId>>,
}

impl NodeAliasIndex {
    pub const IDENTIFIER: &'static str = "dag_rs::module::NodeAliasIndex";

    pub fn new() -> Self {
        Self {
            tables: Arc::new(EntityTables::default()),
            exact: DashMap::new(),
            folded: DashMap::new(),
        }
    }

    /// Number of distinct exact names.
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    fn insert(&self, name: &str, id: NodeId) {
        push_unique(&self.exact, name.to_string(), id);
        push_unique(&self.folded, name.to_lowercase(), id);
    }

    fn forget(&self, name: &str, id: NodeId) -> bool {
        let removed = drop_id(&self.exact, name, id);
        drop_id(&self.folded, &name.to_lowercase(), id);
        removed
    }

    fn covers(&self, nodes: &[Arc<ConceptNode>]) -> bool {
        let mut expected: Vec<(String, NodeId)> = nodes
            .iter()
            .filter_map(|n| n.name().map(|name| (name.to_string(), n.id())))
            .collect();
        let mut indexed: Vec<(String, NodeId)> = self
            .exact
            .iter()
            .flat_map(|entry| {
                let name = entry.key().clone();
                entry.value().iter().map(move |id| (name.clone(), *id)).collect::<Vec<_>>()
            })
            .collect();
        expected.sort_unstable();
        indexed.sort_unstable();
        expected == indexed
    }

    fn image(&self) -> AliasImage {
        let mut image: AliasImage = self
            .exact
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        image.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        image
    }
}

fn push_unique(map: &DashMap<String, Vec<NodeId>>, key: String, id: NodeId) {
    let mut ids = map.entry(key).or_default();
    if let Err(at) = ids.binary_search(&id) {
        ids.insert(at, id);
    }
}

fn drop_id(map: &DashMap<String, Vec<NodeId>>, key: &str, id: NodeId) -> bool {
    let (removed, now_empty) = {
        let Some(mut ids) = map.get_mut(key) else { return false };
        let before = ids.len();
        ids.retain(|i| *i != id);
        (ids.len() != before, ids.is_empty())
    };
    if now_empty {
        map.remove_if(key, |_, ids| ids.is_empty());
    }
    removed
}

impl Default for NodeAliasIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasResolver for NodeAliasIndex {
    fn find_node_by_name(&self, name: &str, exact: bool) -> Vec<Arc<ConceptNode>> {
        let ids = if exact {
            self.exact.get(name).map(|ids| ids.value().clone())
        } else {
            self.folded.get(&name.to_lowercase()).map(|ids| ids.value().clone())
        };
        ids.unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.tables.node(id))
            .collect()
    }
}

impl Module for NodeAliasIndex {
    fn name(&self) -> &str {
        "NodeAliasIndex"
    }

    fn attach(&mut self, tables: Arc<EntityTables>) {
        self.tables = tables;
    }

    fn as_alias_resolver(&self) -> Option<&dyn AliasResolver> {
        Some(self)
    }

    fn add_node(&self, node: &Arc<ConceptNode>) -> bool {
        if let Some(name) = node.name() {
            self.insert(name, node.id());
        }
        true
    }

    fn remove_node(&self, node: &Arc<ConceptNode>) -> bool {
        node.name().is_some_and(|name| self.forget(name, node.id()))
    }

    /// Rebuild unless the index holds exactly the named nodes.
    fn initialisation_complete(&self, nodes: &[Arc<ConceptNode>], _edges: &[Arc<Edge>]) {
        if self.covers(nodes) {
            return;
        }
        tracing::info!(nodes = nodes.len(), "rebuilding alias index");
        self.clear();
        for node in nodes {
            self.add_node(node);
        }
    }

    /// `execute(name)` or `execute(name, exact)`. Exact matching is the
    /// default.
    fn execute(&self, args: &[QueryArg]) -> Result<ModuleOutput> {
        let (name, exact) = match args {
            [QueryArg::Text(name)] => (name, true),
            [QueryArg::Text(name), QueryArg::Bool(exact)] => (name, *exact),
            _ => {
                return Err(Error::InvalidArgument(
                    "alias lookup takes (name) or (name, exact)".into(),
                ));
            }
        };
        Ok(ModuleOutput::Nodes(self.find_node_by_name(name, exact)))
    }

    fn clear(&self) {
        self.exact.clear();
        self.folded.clear();
    }

    fn ids_only(&self) -> bool {
        true
    }

    fn save(&self, codec: Codec) -> Result<Option<Vec<u8>>> {
        codec.encode(&self.image()).map(Some)
    }

    fn load(&self, codec: Codec, bytes: &[u8]) -> Result<()> {
        let image: AliasImage = codec.decode(bytes)?;
        self.clear();
        for (name, ids) in image {
            for id in ids {
                self.insert(&name, id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> (Arc<EntityTables>, NodeAliasIndex) {
        let tables = Arc::new(EntityTables::default());
        let mut index = NodeAliasIndex::new();
        index.attach(Arc::clone(&tables));
        (tables, index)
    }

    fn named(tables: &EntityTables, index: &NodeAliasIndex, name: &str) -> Arc<ConceptNode> {
        let node = Arc::new(ConceptNode::new(tables.nodes.allocate_id(), Some(name.into()), None));
        tables.nodes.insert(Arc::clone(&node));
        index.add_node(&node);
        node
    }

    #[test]
    fn test_exact_and_folded_lookup() {
        let (tables, index) = setup();
        let cow = named(&tables, &index, "Cow");
        let lower = named(&tables, &index, "cow");

        assert_eq!(index.find_node_by_name("Cow", true), vec![Arc::clone(&cow)]);
        assert_eq!(index.find_node_by_name("COW", false), vec![cow, lower]);
        assert!(index.find_node_by_name("COW", true).is_empty());
    }

    #[test]
    fn test_removed_nodes_disappear() {
        let (tables, index) = setup();
        let cow = named(&tables, &index, "Cow");
        tables.nodes.remove(cow.id());
        assert!(index.remove_node(&cow));
        assert!(!index.remove_node(&cow));
        assert!(index.is_empty());
        assert!(index.find_node_by_name("cow", false).is_empty());
    }

    #[test]
    fn test_execute_arguments() {
        let (tables, index) = setup();
        named(&tables, &index, "Cow");
        let out = index.execute(&[QueryArg::from("cow"), QueryArg::from(false)]).unwrap();
        assert_eq!(out.len(), 1);
        let out = index.execute(&[QueryArg::from("cow")]).unwrap();
        assert!(out.is_empty());
        assert!(matches!(index.execute(&[]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_round_trip_and_rebuild() {
        let (tables, index) = setup();
        named(&tables, &index, "Cow");
        named(&tables, &index, "Pig");

        let blob = index.save(Codec::Json).unwrap().unwrap();
        let (_, restored) = setup();
        restored.load(Codec::Json, &blob).unwrap();
        assert_eq!(restored.image(), index.image());

        let (_, fresh) = setup();
        fresh.initialisation_complete(&tables.nodes.snapshot(), &[]);
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn test_initialisation_replaces_stale_blob() {
        let (tables, index) = setup();
        named(&tables, &index, "Cow");
        let stale = index.save(Codec::Bincode).unwrap().unwrap();
        let pig = named(&tables, &index, "Pig");

        let mut restored = NodeAliasIndex::new();
        restored.attach(Arc::clone(&tables));
        restored.load(Codec::Bincode, &stale).unwrap();
        assert!(restored.find_node_by_name("Pig", true).is_empty());

        restored.initialisation_complete(&tables.nodes.snapshot(), &[]);
        assert_eq!(restored.image(), index.image());
        assert_eq!(restored.find_node_by_name("Pig", true), vec![pig]);
    }
}
