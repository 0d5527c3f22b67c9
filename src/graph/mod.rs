//! # GraphStore
//!
//! Owns the node and edge tables, id allocation, the writer lock and the
//! module registry.
//!
//! ## Mutation protocol
//!
//! 1. Take the writer lock (`tx::WriterLock`). Node work happens in the
//!    `NodeDomain`, edge work in the `EdgeDomain`; a node removal enters
//!    the node domain first and descends into the edge domain for the
//!    cascade.
//! 2. Mutate the table.
//! 3. Fan the change out to every module, in registration order.
//!
//! Readers (`get_*_by_id`, module queries) never take the writer lock.
//!
//! ## Node text
//!
//! `find_or_create_node` interprets text in this order:
//!
//! | Text | Result |
//! |------|--------|
//! | empty, with `allow_create` | fresh anonymous concept (not tabled) |
//! | `"..."` | string literal |
//! | all digits | concept lookup by id |
//! | `'...` | primitive literal |
//! | anything else | concept lookup by name, created if allowed and valid |

pub mod parse;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::prelude::*;

use crate::config::StoreConfig;
use crate::model::*;
use crate::module::{Capability, Module, ModuleCatalog, ModuleOutput, ModuleRegistry, QueryArg};
use crate::storage::layout::{read_or_create_module_list, StoreLayout};
use crate::storage::record::{edge_records, node_records};
use crate::storage::{Codec, EdgeRecord, EntityTable, EntityTables, Globals, NodeRecord, TableEntity};
use crate::storage::codec::{commit_files, read_blob};
use crate::tx::{EdgeDomain, MutationKind, NodeDomain, WriterLock};
use crate::{Error, Result};

use parse::{is_numeric, is_valid_name, split_args, strip_outer_parens, VARIABLE_MARKER};

/// The hypergraph store.
pub struct GraphStore {
    tables: Arc<EntityTables>,
    modules: ModuleRegistry,
    writer: WriterLock,
    config: StoreConfig,
    layout: Option<StoreLayout>,
    opened_at: DateTime<Utc>,
}

impl GraphStore {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Open a store with the built-in module catalog.
    ///
    /// With a root directory, the module list is read (or created from
    /// `config.modules`) and any saved state is loaded.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::open_with_catalog(config, ModuleCatalog::default())
    }

    /// Open a store whose module list may name modules outside the
    /// built-in catalog.
    pub fn open_with_catalog(config: StoreConfig, catalog: ModuleCatalog) -> Result<Self> {
        let layout = config.root.clone().map(StoreLayout::new);
        let identifiers = match &layout {
            Some(layout) => read_or_create_module_list(&layout.module_list_file(), &config.modules)?,
            None => config.modules.clone(),
        };
        let store = Self::assemble(config, layout, &catalog, &identifiers);
        if store.layout.is_some() {
            store.load_state()?;
        }
        tracing::info!(
            nodes = store.node_count(),
            edges = store.edge_count(),
            modules = ?store.modules.names(),
            "store opened"
        );
        Ok(store)
    }

    /// Memory-only store with the default modules.
    pub fn in_memory() -> Self {
        let config = StoreConfig::in_memory();
        let identifiers = config.modules.clone();
        Self::assemble(config, None, &ModuleCatalog::default(), &identifiers)
    }

    fn assemble(
        config: StoreConfig,
        layout: Option<StoreLayout>,
        catalog: &ModuleCatalog,
        identifiers: &[String],
    ) -> Self {
        let tables = Arc::new(EntityTables::with_capacity(
            config.initial_node_capacity,
            config.initial_edge_capacity,
        ));
        let modules = ModuleRegistry::new();
        for identifier in identifiers {
            let Some(module) = catalog.create(identifier) else {
                tracing::warn!(module = %identifier, "unknown module identifier; skipped");
                continue;
            };
            if let Err(e) = modules.add(module, &tables) {
                tracing::warn!(module = %identifier, error = %e, "module not registered");
            }
        }
        Self {
            tables,
            modules,
            writer: WriterLock::new(),
            config,
            layout,
            opened_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// The shared tables, as handed to modules.
    pub fn tables(&self) -> &Arc<EntityTables> {
        &self.tables
    }

    pub fn node_count(&self) -> usize {
        self.tables.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.tables.edges.len()
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Resolve `text` to a node, creating a concept when allowed.
    ///
    /// Returns `None` for unparseable text, unknown ids, variables when
    /// `allow_variables` is false, and names that are not found and may
    /// not be created.
    pub fn find_or_create_node(
        &self,
        text: &str,
        creator: Option<&Node>,
        allow_create: bool,
        concept_only: bool,
        allow_variables: bool,
    ) -> Option<Node> {
        if text.is_empty() {
            if !allow_create {
                return None;
            }
            let anonymous = ConceptNode::new(self.tables.nodes.allocate_id(), None, creator.map(Node::key));
            return Some(Node::Concept(Arc::new(anonymous)));
        }
        if !concept_only && text.starts_with('"') {
            return Some(Node::Str(StringNode::parse(text)));
        }
        if is_numeric(text) {
            let id = text.parse::<u64>().ok()?;
            return self.get_node_by_id(NodeId(id)).map(Node::Concept);
        }
        if !concept_only {
            if let Some(literal) = text.strip_prefix(PRIMITIVE_MARKER) {
                return PrimitiveNode::parse(literal).map(Node::Primitive);
            }
        }
        if text.starts_with(VARIABLE_MARKER) && !allow_variables {
            return None;
        }

        if let Some(found) = self.find_node_by_name(text) {
            return Some(Node::Concept(found));
        }
        if !allow_create || !is_valid_name(text, allow_variables) {
            return None;
        }
        let guard = self.writer.lock(MutationKind::Node);
        self.intern_concept(guard.nodes(), text, creator, allow_variables)
            .map(Node::Concept)
    }

    /// Concept called `name`. Ambiguity is logged and the lowest id wins.
    pub fn find_node_by_name(&self, name: &str) -> Option<Arc<ConceptNode>> {
        let found = match self.modules.with_capability(Capability::AliasResolution) {
            Some(module) => module
                .as_alias_resolver()
                .map(|resolver| resolver.find_node_by_name(name, true))
                .unwrap_or_default(),
            None => self
                .tables
                .nodes
                .snapshot()
                .into_iter()
                .filter(|n| n.name() == Some(name))
                .collect(),
        };
        if found.len() > 1 {
            tracing::warn!(name, matches = found.len(), "more than one node found with name");
        }
        found.into_iter().next()
    }

    pub fn get_node_by_id(&self, id: NodeId) -> Option<Arc<ConceptNode>> {
        self.tables.node(id)
    }

    /// Remove a concept and every edge that references it.
    pub fn remove_node(&self, node: &ConceptNode) -> bool {
        self.remove_node_by_id(node.id())
    }

    pub fn remove_node_by_id(&self, id: NodeId) -> bool {
        let guard = self.writer.lock(MutationKind::Node);
        let nodes = guard.nodes();
        let Some(removed) = self.tables.nodes.remove(id) else {
            return false;
        };

        let edges = nodes.edges();
        let related = self.edges_containing(&Node::Concept(Arc::clone(&removed)));
        let cascade = related.len();
        for edge in related {
            self.detach_edge(edges, edge.id());
        }

        for module in self.modules.snapshot() {
            module.remove_node(&removed);
        }
        tracing::debug!(node = %id, cascade, "node removed");
        true
    }

    /// Look the name up again under the lock, then create and table it.
    fn intern_concept(
        &self,
        _nodes: NodeDomain<'_>,
        name: &str,
        creator: Option<&Node>,
        allow_variables: bool,
    ) -> Option<Arc<ConceptNode>> {
        if let Some(found) = self.find_node_by_name(name) {
            return Some(found);
        }
        if !is_valid_name(name, allow_variables) {
            return None;
        }
        let node = Arc::new(ConceptNode::new(
            self.tables.nodes.allocate_id(),
            Some(name.to_string()),
            creator.map(Node::key),
        ));
        if !self.tables.nodes.insert(Arc::clone(&node)) {
            tracing::warn!(node = %node.id(), "node id already present; creation abandoned");
            return None;
        }
        for module in self.modules.snapshot() {
            if !module.add_node(&node) {
                tracing::debug!(module = module.name(), node = %node.id(), "module declined node (advisory)");
            }
        }
        tracing::trace!(node = %node.id(), name, "node created");
        Some(node)
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Find the edge with exactly `nodes`, or create it.
    ///
    /// Unless `no_checks` is configured, every concept argument must be in
    /// the store. With `allow_create_nodes` a missing concept is interned by
    /// name and the tabled instance takes its place; otherwise the result
    /// is `EdgeOutcome::NonExistentNode`.
    pub fn find_or_create_edge(
        &self,
        creator: Option<&Node>,
        allow_create_nodes: bool,
        nodes: &[Node],
    ) -> Result<EdgeOutcome> {
        if nodes.is_empty() {
            return Err(Error::InvalidArgument("an edge needs at least one node".into()));
        }
        let guard = self.writer.lock(MutationKind::Edge);
        if let Some(existing) = self.find_edge(nodes) {
            return Ok(EdgeOutcome::Existing(existing));
        }

        let node_domain = guard.nodes();
        let mut resolved = EdgeNodes::with_capacity(nodes.len());
        let mut substituted = false;
        for node in nodes {
            let Node::Concept(concept) = node else {
                resolved.push(node.clone());
                continue;
            };
            if self.config.no_checks {
                resolved.push(node.clone());
                continue;
            }
            if let Some(live) = self.tables.node(concept.id()) {
                resolved.push(Node::Concept(live));
                continue;
            }
            let created = match concept.name() {
                Some(name) if allow_create_nodes => self.intern_concept(node_domain, name, creator, false),
                _ => None,
            };
            match created {
                Some(live) => {
                    substituted = true;
                    resolved.push(Node::Concept(live));
                }
                None => return Ok(EdgeOutcome::NonExistentNode(node.clone())),
            }
        }

        if substituted {
            if let Some(existing) = self.find_edge(&resolved) {
                return Ok(EdgeOutcome::Existing(existing));
            }
        }
        let edge = self.insert_edge(node_domain.edges(), resolved, creator);
        Ok(EdgeOutcome::Created(edge))
    }

    /// The edge with exactly `nodes`, if any. Ambiguity is logged and the
    /// lowest id wins.
    pub fn find_edge(&self, nodes: &[Node]) -> Option<Arc<Edge>> {
        let found = match self.modules.with_capability(Capability::RelatedEdges) {
            Some(module) => module
                .as_edge_locator()
                .map(|locator| locator.find_edge_by_nodes(nodes))
                .unwrap_or_default(),
            None => self.scan_edges(|e| e.has_nodes(nodes)),
        };
        if found.len() > 1 {
            let identifiers: Vec<String> = nodes.iter().map(Node::identifier).collect();
            tracing::warn!(nodes = ?identifiers, matches = found.len(), "more than one edge found with nodes");
        }
        found.into_iter().next()
    }

    pub fn get_edge_by_id(&self, id: EdgeId) -> Option<Arc<Edge>> {
        self.tables.edge(id)
    }

    pub fn remove_edge(&self, edge: &Edge) -> bool {
        self.remove_edge_by_id(edge.id())
    }

    pub fn remove_edge_by_id(&self, id: EdgeId) -> bool {
        let guard = self.writer.lock(MutationKind::Edge);
        self.detach_edge(guard.nodes().edges(), id).is_some()
    }

    fn insert_edge(&self, _edges: EdgeDomain<'_>, nodes: EdgeNodes, creator: Option<&Node>) -> Arc<Edge> {
        let edge = Arc::new(Edge::new(self.tables.edges.allocate_id(), nodes, creator.map(Node::key)));
        // Ids are fresh, so the insert cannot collide.
        self.tables.edges.insert(Arc::clone(&edge));
        for module in self.modules.snapshot() {
            if !module.add_edge(&edge) {
                tracing::debug!(module = module.name(), edge = %edge.id(), "module declined edge (advisory)");
            }
        }
        tracing::trace!(edge = %edge.id(), "edge created");
        edge
    }

    fn detach_edge(&self, _edges: EdgeDomain<'_>, id: EdgeId) -> Option<Arc<Edge>> {
        let edge = self.tables.edges.remove(id)?;
        for module in self.modules.snapshot() {
            module.remove_edge(&edge);
        }
        Some(edge)
    }

    /// Every edge referencing `node`, via the related-edge module when one
    /// is registered.
    fn edges_containing(&self, node: &Node) -> Vec<Arc<Edge>> {
        if let Some(module) = self.modules.with_capability(Capability::RelatedEdges) {
            if let Some(locator) = module.as_edge_locator() {
                return locator.edges_containing(node);
            }
        }
        self.scan_edges(|e| e.contains_node(node))
    }

    fn scan_edges(&self, keep: impl Fn(&Edge) -> bool) -> Vec<Arc<Edge>> {
        self.tables.edges.snapshot().into_iter().filter(|e| keep(e.as_ref())).collect()
    }

    /// Parse a whitespace-separated node list, optionally parenthesized.
    /// Fails as a whole if any token does not resolve.
    pub fn parse_nodes(
        &self,
        text: &str,
        creator: Option<&Node>,
        create_nodes: bool,
        allow_variables: bool,
    ) -> Option<Vec<Node>> {
        split_args(strip_outer_parens(text))
            .iter()
            .map(|token| {
                if !allow_variables && token.starts_with(VARIABLE_MARKER) {
                    return None;
                }
                self.find_or_create_node(token, creator, create_nodes, false, allow_variables)
            })
            .collect()
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Set a property, write the entity back to its table and notify
    /// modules. Returns the previous value.
    pub fn add_property(&self, entity: &Entity, key: &str, value: &str) -> Option<String> {
        let _guard = self.writer.lock(MutationKind::Property);
        let previous = entity.put_property(key, value);
        self.write_back(entity);
        for module in self.modules.snapshot() {
            module.add_property(entity, key, value);
        }
        previous
    }

    /// Remove a property, write back and notify. Returns the removed value.
    pub fn remove_property(&self, entity: &Entity, key: &str) -> Option<String> {
        let _guard = self.writer.lock(MutationKind::Property);
        let removed = entity.take_property(key);
        self.write_back(entity);
        for module in self.modules.snapshot() {
            module.remove_property(entity, key);
        }
        removed
    }

    fn write_back(&self, entity: &Entity) {
        let live = match entity {
            Entity::Node(n) => self.tables.nodes.update(n),
            Entity::Edge(e) => self.tables.edges.update(e),
        };
        if !live {
            tracing::debug!(kind = entity.kind(), id = entity.id(), "property set on an entity outside the tables");
        }
    }

    // ========================================================================
    // Sampling
    // ========================================================================

    pub fn random_node(&self) -> Option<Arc<ConceptNode>> {
        self.sample(&self.tables.nodes)
    }

    pub fn random_edge(&self) -> Option<Arc<Edge>> {
        self.sample(&self.tables.edges)
    }

    /// Bounded rejection sampling over `[0, counter]`, then a uniform pick
    /// among the live ids.
    fn sample<T: TableEntity>(&self, table: &EntityTable<T>) -> Option<Arc<T>> {
        let counter = table.counter();
        if counter == 0 {
            return None;
        }
        let mut rng = thread_rng();
        for _ in 0..self.config.random_retries {
            if let Some(hit) = table.get_raw(rng.gen_range(0..=counter)) {
                return Some(hit);
            }
        }
        let ids = table.ids();
        let id = ids.choose(&mut rng)?;
        table.get(*id)
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// Attach and register a module, then let it catch up on the current
    /// tables.
    pub fn add_module(&self, module: Box<dyn Module>) -> Result<Arc<dyn Module>> {
        let _guard = self.writer.lock(MutationKind::State);
        let module = self.modules.add(module, &self.tables)?;
        module.initialisation_complete(&self.tables.nodes.snapshot(), &self.tables.edges.snapshot());
        Ok(module)
    }

    pub fn get_module<T: Module>(&self) -> Option<Arc<T>> {
        self.modules.get::<T>()
    }

    pub fn module_with(&self, capability: Capability) -> Option<Arc<dyn Module>> {
        self.modules.with_capability(capability)
    }

    /// Registered modules in hook order.
    pub fn modules(&self) -> Vec<Arc<dyn Module>> {
        self.modules.snapshot()
    }

    /// Run a query against the module registered under `name`.
    pub fn execute(&self, name: &str, args: &[QueryArg]) -> Result<ModuleOutput> {
        let module = self
            .modules
            .by_name(name)
            .ok_or_else(|| Error::NotFound(format!("module {name}")))?;
        module.execute(args)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Drop every node and edge and clear every module. Id counters keep
    /// running.
    pub fn clear(&self) {
        let guard = self.writer.lock(MutationKind::State);
        let _nodes = guard.nodes();
        self.tables.nodes.clear();
        self.tables.edges.clear();
        for module in self.modules.snapshot() {
            module.clear();
        }
        tracing::info!("store cleared");
    }

    /// Write tables, module blobs and globals under the root.
    ///
    /// Every payload is encoded in memory first; any codec or module error
    /// is returned before the root is touched. The files are then staged
    /// as temporaries and renamed together, so a failed save leaves the
    /// previous state on disk.
    pub fn save_state(&self) -> Result<()> {
        let layout = self.require_layout()?;
        let _guard = self.writer.lock(MutationKind::State);
        let codec = self.config.codec;

        let nodes = self.tables.nodes.snapshot();
        let edges = self.tables.edges.snapshot();
        let mut files = vec![
            (layout.node_file(), codec.encode(&node_records(&nodes))?),
            (layout.edge_file(), codec.encode(&edge_records(&edges))?),
        ];

        for module in self.modules.snapshot() {
            let blob = module
                .save(codec)
                .map_err(|e| Error::Module(format!("{} failed to save: {e}", module.name())))?;
            if let Some(bytes) = blob {
                files.push((layout.module_file(module.name()), bytes));
            }
        }

        let globals = Globals {
            num_nodes: nodes.len(),
            node_id: self.tables.nodes.counter(),
            num_edges: edges.len(),
            edge_id: self.tables.edges.counter(),
        };
        files.push((layout.globals_file(), globals.render().into_bytes()));

        commit_files(&files)?;
        tracing::info!(root = %layout.root().display(), nodes = nodes.len(), edges = edges.len(), "state saved");
        Ok(())
    }

    /// Replace the tables and module state with what is saved under the
    /// root. Unreadable files are logged and treated as empty; modules are
    /// then given the full tables to rebuild from.
    pub fn load_state(&self) -> Result<()> {
        let layout = self.require_layout()?;
        let _guard = self.writer.lock(MutationKind::State);
        let codec = self.config.codec;

        let globals = Globals::read(&layout.globals_file()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable globals file; using defaults");
            None
        });

        let node_records: Vec<NodeRecord> = read_or_empty(codec, &layout.node_file());
        let nodes: Vec<Arc<ConceptNode>> = node_records.into_iter().map(|r| Arc::new(r.into_node())).collect();
        self.tables.nodes.replace_all(nodes.iter().cloned());

        let edge_records: Vec<EdgeRecord> = read_or_empty(codec, &layout.edge_file());
        let mut edges = Vec::with_capacity(edge_records.len());
        for record in edge_records {
            let id = record.id;
            match record.resolve(&self.tables.nodes) {
                Ok(edge) => edges.push(Arc::new(edge)),
                Err(missing) => tracing::warn!(edge = %id, node = %missing, "edge references a missing node; dropped"),
            }
        }
        self.tables.edges.replace_all(edges.iter().cloned());

        let globals = globals.unwrap_or_default();
        let max_node = self.tables.nodes.max_id().map_or(0, |id| id.0);
        let max_edge = self.tables.edges.max_id().map_or(0, |id| id.0);
        self.tables.nodes.advance_counter(globals.node_id.max(max_node));
        self.tables.edges.advance_counter(globals.edge_id.max(max_edge));
        if globals.num_nodes != nodes.len() || globals.num_edges != edges.len() {
            tracing::debug!(
                saved_nodes = globals.num_nodes,
                saved_edges = globals.num_edges,
                "saved counts differ from loaded tables"
            );
        }

        let modules = self.modules.snapshot();
        for module in &modules {
            module.clear();
            match read_blob(&layout.module_file(module.name())) {
                Ok(Some(bytes)) => {
                    if let Err(e) = module.load(codec, &bytes) {
                        tracing::warn!(module = module.name(), error = %e, "unreadable module state; starting fresh");
                        module.clear();
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(module = module.name(), error = %e, "module state not readable"),
            }
        }
        for module in &modules {
            module.initialisation_complete(&nodes, &edges);
        }

        tracing::info!(root = %layout.root().display(), nodes = nodes.len(), edges = edges.len(), "state loaded");
        Ok(())
    }

    /// Save (when persistent) and close the store.
    pub fn shutdown(self) -> Result<()> {
        if self.layout.is_some() {
            self.save_state()?;
        }
        tracing::info!(uptime_secs = (Utc::now() - self.opened_at).num_seconds(), "store shut down");
        Ok(())
    }

    fn require_layout(&self) -> Result<&StoreLayout> {
        self.layout
            .as_ref()
            .ok_or_else(|| Error::Persistence("store has no root directory".into()))
    }
}

/// Decode a table file, logging and substituting an empty table on failure.
fn read_or_empty<T: serde::de::DeserializeOwned>(codec: Codec, path: &std::path::Path) -> Vec<T> {
    match codec.read_file::<Vec<T>>(path) {
        Ok(records) => records.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable table file; starting empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{NodeAliasIndex, RelatedEdgeIndex};
    use pretty_assertions::assert_eq;

    fn bare_store() -> GraphStore {
        let config = StoreConfig::in_memory().with_modules(Vec::<String>::new());
        let identifiers = config.modules.clone();
        GraphStore::assemble(config, None, &ModuleCatalog::default(), &identifiers)
    }

    fn concept(store: &GraphStore, name: &str) -> Node {
        store.find_or_create_node(name, None, true, true, false).unwrap()
    }

    #[test]
    fn test_text_precedence() {
        let store = GraphStore::in_memory();
        let cow = concept(&store, "Cow");
        let id = cow.concept_id().unwrap();

        assert_eq!(store.find_or_create_node(&id.to_string(), None, false, false, false), Some(cow.clone()));
        assert_eq!(store.find_or_create_node("\"Cow\"", None, false, false, false), Some(Node::string("Cow")));
        assert_eq!(store.find_or_create_node("'12", None, false, false, false), Some(Node::primitive(12)));
        assert_eq!(store.find_or_create_node("'nope", None, false, false, false), None);
        assert_eq!(store.find_or_create_node("\"Cow\"", None, true, true, false), None);
        assert_eq!(store.find_or_create_node("?x", None, true, false, false), None);
        assert_eq!(store.find_or_create_node("Pig", None, false, false, false), None);
    }

    #[test]
    fn test_anonymous_nodes_are_not_tabled() {
        let store = GraphStore::in_memory();
        let a = store.find_or_create_node("", None, true, false, false).unwrap();
        let b = store.find_or_create_node("", None, true, false, false).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.find_or_create_node("", None, false, false, false), None);
    }

    #[test]
    fn test_name_and_edge_lookup_fall_back_to_scans() {
        let store = bare_store();
        let isa = concept(&store, "isa");
        let cow = concept(&store, "Cow");
        assert_eq!(concept(&store, "Cow"), cow);
        assert_eq!(store.node_count(), 2);

        let edge = store.find_or_create_edge(None, false, &[isa.clone(), cow.clone()]).unwrap();
        assert!(edge.is_created());
        let again = store.find_or_create_edge(None, false, &[isa.clone(), cow.clone()]).unwrap();
        assert!(!again.is_created());
        assert_eq!(again.edge(), edge.edge());

        assert!(store.remove_node(cow.as_concept().unwrap()));
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_missing_node_sentinel() {
        let store = GraphStore::in_memory();
        let isa = concept(&store, "isa");
        let ghost = Node::Concept(Arc::new(ConceptNode::new(NodeId(999), Some("Ghost".into()), None)));

        let outcome = store.find_or_create_edge(None, false, &[isa.clone(), ghost.clone()]).unwrap();
        assert!(matches!(outcome, EdgeOutcome::NonExistentNode(ref n) if *n == ghost));
        assert_eq!(store.edge_count(), 0);

        let outcome = store.find_or_create_edge(None, true, &[isa, ghost]).unwrap();
        let edge = outcome.into_edge().unwrap();
        let interned = store.find_node_by_name("Ghost").unwrap();
        assert_eq!(edge.node_at(2), Some(&Node::Concept(interned)));
    }

    #[test]
    fn test_empty_edge_is_rejected() {
        let store = GraphStore::in_memory();
        assert!(matches!(store.find_or_create_edge(None, true, &[]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_properties_write_back_and_read() {
        let store = GraphStore::in_memory();
        let cow = concept(&store, "Cow");
        let entity = Entity::from(cow.as_concept().unwrap());
        assert_eq!(store.add_property(&entity, "colour", "brown"), None);
        assert_eq!(store.add_property(&entity, "colour", "black"), Some("brown".into()));

        let live = store.get_node_by_id(cow.concept_id().unwrap()).unwrap();
        assert_eq!(live.property("colour"), Some("black".into()));
        assert_eq!(store.remove_property(&entity, "colour"), Some("black".into()));
        assert_eq!(live.property("colour"), None);
    }

    #[test]
    fn test_sampling_is_bounded() {
        let store = GraphStore::in_memory();
        assert!(store.random_node().is_none());
        assert!(store.random_edge().is_none());

        let names: Vec<String> = (0..50).map(|i| format!("n{i}")).collect();
        for name in &names {
            concept(&store, name);
        }
        for i in 1..50 {
            store.remove_node_by_id(NodeId(i));
        }
        // One live id out of fifty: the fallback must still find it.
        let survivor = store.random_node().unwrap();
        assert_eq!(survivor.id(), NodeId(50));
    }

    #[test]
    fn test_module_registry_surface() {
        let store = GraphStore::in_memory();
        assert!(store.get_module::<RelatedEdgeIndex>().is_some());
        assert!(store.get_module::<NodeAliasIndex>().is_some());
        assert_eq!(store.module_with(Capability::AliasResolution).unwrap().name(), "NodeAliasIndex");
        assert!(matches!(
            store.add_module(Box::new(RelatedEdgeIndex::new())),
            Err(Error::ModuleExists(_))
        ));
    }

    #[test]
    fn test_added_module_catches_up() {
        let store = bare_store();
        let isa = concept(&store, "isa");
        let cow = concept(&store, "Cow");
        store.find_or_create_edge(None, false, &[isa, cow.clone()]).unwrap();

        store.add_module(Box::new(RelatedEdgeIndex::new())).unwrap();
        let index = store.get_module::<RelatedEdgeIndex>().unwrap();
        assert_eq!(index.positions(cow.concept_id().unwrap()), vec![(2, 1)]);
    }

    #[test]
    fn test_execute_by_module_name() {
        let store = GraphStore::in_memory();
        concept(&store, "Cow");
        let out = store.execute("NodeAliasIndex", &[QueryArg::from("cow"), QueryArg::from(false)]).unwrap();
        assert_eq!(out.into_nodes().unwrap().len(), 1);
        assert!(matches!(store.execute("Missing", &[]), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_save_requires_root() {
        let store = GraphStore::in_memory();
        assert!(matches!(store.save_state(), Err(Error::Persistence(_))));
    }

    #[test]
    fn test_clear_keeps_counters() {
        let store = GraphStore::in_memory();
        concept(&store, "Cow");
        store.clear();
        assert_eq!(store.node_count(), 0);
        let pig = concept(&store, "Pig");
        assert_eq!(pig.concept_id(), Some(NodeId(2)));
    }
}
