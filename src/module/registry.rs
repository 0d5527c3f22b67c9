//! Module registry and catalog.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::EntityTables;
use crate::{Error, Result};
use super::{AsAny, Capability, Module, NodeAliasIndex, RelatedEdgeIndex};

/// Constructor for a module listed in the module-list file.
pub type ModuleFactory = fn() -> Box<dyn Module>;

// ============================================================================
// ModuleCatalog
// ============================================================================

/// Maps module identifiers (as written in `activeModules.config`) to
/// constructors.
#[derive(Clone)]
pub struct ModuleCatalog {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    /// A catalog with no entries.
    pub fn empty() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register(&mut self, identifier: impl Into<String>, factory: ModuleFactory) {
        self.factories.insert(identifier.into(), factory);
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// Build a fresh, unattached module.
    pub fn create(&self, identifier: &str) -> Option<Box<dyn Module>> {
        self.factories.get(identifier).map(|f| f())
    }

    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ModuleCatalog {
    /// The built-in modules.
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register(RelatedEdgeIndex::IDENTIFIER, || Box::new(RelatedEdgeIndex::new()));
        catalog.register(NodeAliasIndex::IDENTIFIER, || Box::new(NodeAliasIndex::new()));
        catalog
    }
}

impl std::fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCatalog").field("identifiers", &self.identifiers()).finish()
    }
}

// ============================================================================
// ModuleRegistry
// ============================================================================

/// The store's live modules: one instance per concrete type, kept in
/// registration order (which is hook order).
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<Vec<Arc<dyn Module>>>,
    by_type: RwLock<HashMap<TypeId, usize>>,
    by_capability: RwLock<HashMap<Capability, usize>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `module` to `tables` and register it.
    pub fn add(&self, mut module: Box<dyn Module>, tables: &Arc<EntityTables>) -> Result<Arc<dyn Module>> {
        module.attach(Arc::clone(tables));
        self.insert(Arc::from(module))
    }

    /// Register an already-attached module.
    pub fn insert(&self, module: Arc<dyn Module>) -> Result<Arc<dyn Module>> {
        let type_id = type_of(&*module);
        let mut modules = self.modules.write();
        let mut by_type = self.by_type.write();
        if by_type.contains_key(&type_id) {
            return Err(Error::ModuleExists(module.name().to_string()));
        }
        by_type.insert(type_id, modules.len());
        modules.push(Arc::clone(&module));
        tracing::debug!(module = module.name(), "module registered");
        Ok(module)
    }

    /// The module of exactly type `T`.
    pub fn get<T: Module>(&self) -> Option<Arc<T>> {
        let idx = *self.by_type.read().get(&TypeId::of::<T>())?;
        let module = Arc::clone(self.modules.read().get(idx)?);
        AsAny::into_any(module).downcast::<T>().ok()
    }

    /// The first module, in registration order, exposing `capability`.
    /// Resolved mappings are cached; misses are not.
    pub fn with_capability(&self, capability: Capability) -> Option<Arc<dyn Module>> {
        if let Some(&idx) = self.by_capability.read().get(&capability) {
            return self.modules.read().get(idx).cloned();
        }
        let modules = self.modules.read();
        let idx = modules.iter().position(|m| m.provides(capability))?;
        self.by_capability.write().insert(capability, idx);
        Some(Arc::clone(&modules[idx]))
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.read().iter().find(|m| m.name() == name).cloned()
    }

    /// Registered modules in hook order.
    pub fn snapshot(&self) -> Vec<Arc<dyn Module>> {
        self.modules.read().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.modules.read().iter().map(|m| m.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }
}

fn type_of(module: &(dyn Module + 'static)) -> TypeId {
    module.as_any().type_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{AliasResolver, ModuleOutput, QueryArg};
    use crate::model::ConceptNode;

    struct Counter;

    impl Module for Counter {
        fn name(&self) -> &str { "Counter" }

        fn execute(&self, _args: &[QueryArg]) -> Result<ModuleOutput> {
            Ok(ModuleOutput::Count(0))
        }
    }

    struct CustomAlias;

    impl AliasResolver for CustomAlias {
        fn find_node_by_name(&self, _name: &str, _exact: bool) -> Vec<Arc<ConceptNode>> {
            Vec::new()
        }
    }

    impl Module for CustomAlias {
        fn name(&self) -> &str { "CustomAlias" }

        fn as_alias_resolver(&self) -> Option<&dyn AliasResolver> { Some(self) }

        fn execute(&self, _args: &[QueryArg]) -> Result<ModuleOutput> {
            Ok(ModuleOutput::Nodes(Vec::new()))
        }
    }

    #[test]
    fn test_get_by_exact_type() {
        let tables = Arc::new(EntityTables::default());
        let registry = ModuleRegistry::new();
        registry.add(Box::new(Counter), &tables).unwrap();
        registry.add(Box::new(RelatedEdgeIndex::new()), &tables).unwrap();

        assert!(registry.get::<Counter>().is_some());
        assert!(registry.get::<RelatedEdgeIndex>().is_some());
        assert!(registry.get::<NodeAliasIndex>().is_none());
        assert_eq!(registry.names(), vec!["Counter", "RelatedEdgeIndex"]);
    }

    #[test]
    fn test_second_instance_of_a_type_is_rejected() {
        let tables = Arc::new(EntityTables::default());
        let registry = ModuleRegistry::new();
        registry.add(Box::new(Counter), &tables).unwrap();
        let err = registry.add(Box::new(Counter), &tables).err().expect("second add should fail");
        assert!(matches!(err, Error::ModuleExists(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_capability_lookup_takes_first_registered() {
        let tables = Arc::new(EntityTables::default());
        let registry = ModuleRegistry::new();
        assert!(registry.with_capability(Capability::AliasResolution).is_none());

        registry.add(Box::new(CustomAlias), &tables).unwrap();
        registry.add(Box::new(NodeAliasIndex::new()), &tables).unwrap();

        let first = registry.with_capability(Capability::AliasResolution).unwrap();
        assert_eq!(first.name(), "CustomAlias");
        // cached path
        let again = registry.with_capability(Capability::AliasResolution).unwrap();
        assert_eq!(again.name(), "CustomAlias");
        assert!(registry.with_capability(Capability::RelatedEdges).is_none());
    }

    #[test]
    fn test_catalog_builds_builtins() {
        let catalog = ModuleCatalog::default();
        assert!(catalog.contains(RelatedEdgeIndex::IDENTIFIER));
        assert_eq!(catalog.create(NodeAliasIndex::IDENTIFIER).unwrap().name(), "NodeAliasIndex");
        assert!(catalog.create("graph.module.Unknown").is_none());
    }
}
