//! Id-indexed entity tables.
//!
//! Same shape as the old in-memory backend: a `HashMap` behind a
//! `parking_lot::RwLock` plus an atomic id counter. Readers take the read
//! lock for the duration of a single lookup only; they never touch the
//! store's writer lock.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::*;

/// Upper bound on eager table pre-allocation; larger hints grow lazily.
const MAX_PREALLOC: usize = 4096;

/// Something that can live in an `EntityTable`.
pub trait TableEntity: Send + Sync + 'static {
    type Id: Copy + Eq + Hash + Ord + fmt::Display + Send + Sync;

    fn entity_id(&self) -> Self::Id;

    fn id_from_raw(raw: u64) -> Self::Id;
}

impl TableEntity for ConceptNode {
    type Id = NodeId;

    fn entity_id(&self) -> NodeId { self.id() }

    fn id_from_raw(raw: u64) -> NodeId { NodeId(raw) }
}

impl TableEntity for Edge {
    type Id = EdgeId;

    fn entity_id(&self) -> EdgeId { self.id() }

    fn id_from_raw(raw: u64) -> EdgeId { EdgeId(raw) }
}

// ============================================================================
// EntityTable
// ============================================================================

/// O(1) id lookup, insert and remove, plus a persisted id counter.
///
/// The counter holds the last id handed out. It only ever grows, so ids
/// are never reused even after removal or `clear()`.
pub struct EntityTable<T: TableEntity> {
    entries: RwLock<HashMap<T::Id, Arc<T>>>,
    counter: AtomicU64,
}

impl<T: TableEntity> EntityTable<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity.min(MAX_PREALLOC))),
            counter: AtomicU64::new(0),
        }
    }

    /// Reserve the next id.
    pub fn allocate_id(&self) -> T::Id {
        T::id_from_raw(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Last id handed out (0 when nothing has been allocated).
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Raise the counter to at least `value`. Never lowers it.
    pub fn advance_counter(&self, value: u64) {
        self.counter.fetch_max(value, Ordering::SeqCst);
    }

    /// Insert an entity. Returns false if its id is already present.
    pub fn insert(&self, entity: Arc<T>) -> bool {
        let mut entries = self.entries.write();
        let id = entity.entity_id();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, entity);
        true
    }

    /// Write an entity back after mutation. Only replaces live entries.
    pub fn update(&self, entity: &Arc<T>) -> bool {
        let mut entries = self.entries.write();
        match entries.get_mut(&entity.entity_id()) {
            Some(slot) => {
                *slot = Arc::clone(entity);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: T::Id) -> Option<Arc<T>> {
        self.entries.read().get(&id).cloned()
    }

    pub fn get_raw(&self, raw: u64) -> Option<Arc<T>> {
        self.get(T::id_from_raw(raw))
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.entries.read().contains_key(&id)
    }

    pub fn remove(&self, id: T::Id) -> Option<Arc<T>> {
        self.entries.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All live entities, ordered by id.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let mut all: Vec<Arc<T>> = self.entries.read().values().cloned().collect();
        all.sort_by_key(|e| e.entity_id());
        all
    }

    /// All live ids, unordered.
    pub fn ids(&self) -> Vec<T::Id> {
        self.entries.read().keys().copied().collect()
    }

    /// Drop every entity. The id counter is left alone.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Replace the contents wholesale (used by state loading).
    pub(crate) fn replace_all(&self, entities: impl IntoIterator<Item = Arc<T>>) {
        let mut entries = self.entries.write();
        entries.clear();
        for e in entities {
            entries.insert(e.entity_id(), e);
        }
    }

    /// Highest live id, if any.
    pub fn max_id(&self) -> Option<T::Id> {
        self.entries.read().keys().max().copied()
    }
}

// ============================================================================
// EntityTables
// ============================================================================

/// The node and edge tables, shared read-only with modules.
///
/// Modules hold an `Arc<EntityTables>` handed to them at attach time, which
/// is how they dereference ids without a back-pointer to the store.
pub struct EntityTables {
    pub nodes: EntityTable<ConceptNode>,
    pub edges: EntityTable<Edge>,
}

impl EntityTables {
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes: EntityTable::with_capacity(nodes),
            edges: EntityTable::with_capacity(edges),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<Arc<ConceptNode>> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<Arc<Edge>> {
        self.edges.get(id)
    }

    /// Turn a value-form key back into a live node. Concept keys resolve
    /// only while the concept is in the table.
    pub fn resolve(&self, key: &NodeKey) -> Option<Node> {
        match key {
            NodeKey::Concept(id) => self.nodes.get(*id).map(Node::Concept),
            other => other.literal(),
        }
    }
}

impl Default for EntityTables {
    fn default() -> Self {
        Self::with_capacity(0, 0)
    }
}
