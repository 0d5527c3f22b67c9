//! End-to-end persistence tests: save a store under a temporary root, open
//! a fresh store on the same root, and compare.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dag_rs::storage::layout::{EDGE_FILE, GLOBALS_FILE, MODULE_LIST_FILE, NODE_FILE};
use dag_rs::{
    args, Codec, Edge, EdgeId, Entity, Error, GraphStore, Module, ModuleOutput, Node, NodeId, QueryArg,
    RelatedEdgeIndex, Result, StoreConfig,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

fn config(root: &std::path::Path, codec: Codec) -> StoreConfig {
    StoreConfig::persistent(root).with_capacity(64, 64).with_codec(codec)
}

fn populate(store: &GraphStore) -> (Node, Node) {
    let nodes = store.parse_nodes("isa Cow Mammal", None, true, false).unwrap();
    store.find_or_create_edge(None, false, &nodes).unwrap();
    let more = store.parse_nodes("isa Pig Mammal", None, true, false).unwrap();
    store.find_or_create_edge(None, false, &more).unwrap();
    let named = store.parse_nodes("name Cow \"Daisy\"", None, true, false).unwrap();
    store.find_or_create_edge(None, false, &named).unwrap();
    let cow = nodes[1].clone();
    store.add_property(&Entity::from(cow.as_concept().unwrap()), "colour", "brown");
    (cow, nodes[2].clone())
}

fn edge_ids(edges: Vec<Arc<Edge>>) -> Vec<EdgeId> {
    edges.iter().map(|e| e.id()).collect()
}

fn add_edge(store: &GraphStore, text: &str) -> bool {
    let nodes = store.parse_nodes(text, None, true, false).unwrap();
    store.find_or_create_edge(None, false, &nodes).unwrap().is_created()
}

/// Every file under `root`, keyed by path, with its bytes.
fn read_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let bytes = fs::read(&path).unwrap();
                files.insert(path, bytes);
            }
        }
    }
    files
}

/// Saves a marker blob until told to fail.
struct FailingSave {
    failing: Arc<AtomicBool>,
}

impl Module for FailingSave {
    fn name(&self) -> &str {
        "FailingSave"
    }

    fn execute(&self, _args: &[QueryArg]) -> Result<ModuleOutput> {
        Ok(ModuleOutput::Count(0))
    }

    fn save(&self, _codec: Codec) -> Result<Option<Vec<u8>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Persistence("disk full".into()));
        }
        Ok(Some(b"ok".to_vec()))
    }
}

// ============================================================================
// 1. Round trips
// ============================================================================

fn round_trip(codec: Codec) {
    let dir = tempfile::tempdir().unwrap();
    let store = GraphStore::open(config(dir.path(), codec)).unwrap();
    let (cow, mammal) = populate(&store);
    let index = store.get_module::<RelatedEdgeIndex>().unwrap();
    let by_cow = edge_ids(index.query(&args![&cow]).unwrap());
    let by_mammal = edge_ids(index.query(&args![&mammal, 3]).unwrap());
    let node_counter = store.tables().nodes.counter();
    let edge_counter = store.tables().edges.counter();
    store.shutdown().unwrap();

    let store = GraphStore::open(config(dir.path(), codec)).unwrap();
    assert_eq!(store.node_count(), 5);
    assert_eq!(store.edge_count(), 3);
    assert_eq!(store.tables().nodes.counter(), node_counter);
    assert_eq!(store.tables().edges.counter(), edge_counter);

    let cow = store.find_or_create_node("Cow", None, false, true, false).unwrap();
    let mammal = store.find_or_create_node("Mammal", None, false, true, false).unwrap();
    assert_eq!(cow.as_concept().unwrap().property("colour"), Some("brown".into()));

    let index = store.get_module::<RelatedEdgeIndex>().unwrap();
    assert_eq!(edge_ids(index.query(&args![&cow]).unwrap()), by_cow);
    assert_eq!(edge_ids(index.query(&args![&mammal, 3]).unwrap()), by_mammal);
    assert_eq!(index.query(&args![Node::string("Daisy")]).unwrap().len(), 1);

    // New ids continue past the saved counters.
    let goat = store.find_or_create_node("Goat", None, true, true, false).unwrap();
    assert_eq!(goat.concept_id(), Some(NodeId(node_counter + 1)));
}

#[test]
fn test_round_trip_bincode() {
    round_trip(Codec::Bincode);
}

#[test]
fn test_round_trip_json() {
    round_trip(Codec::Json);
}

#[test]
fn test_save_writes_expected_layout() {
    let dir = tempfile::tempdir().unwrap();
    let store = GraphStore::open(config(dir.path(), Codec::Json)).unwrap();
    populate(&store);
    store.save_state().unwrap();

    for file in [NODE_FILE, EDGE_FILE, GLOBALS_FILE, MODULE_LIST_FILE] {
        assert!(dir.path().join(file).exists(), "{file} missing");
    }
    assert!(dir.path().join("modules").join("RelatedEdgeIndex").exists());
    assert!(dir.path().join("modules").join("NodeAliasIndex").exists());

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
        .collect();
    assert!(leftovers.is_empty());

    let globals = fs::read_to_string(dir.path().join(GLOBALS_FILE)).unwrap();
    assert!(globals.contains("numNodes=5"));
    assert!(globals.contains("numEdges=3"));
}

#[test]
fn test_failed_save_leaves_root_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let failing = Arc::new(AtomicBool::new(false));
    let store = GraphStore::open(config(dir.path(), Codec::Bincode)).unwrap();
    store.add_module(Box::new(FailingSave { failing: Arc::clone(&failing) })).unwrap();
    populate(&store);
    store.save_state().unwrap();
    let before = read_tree(dir.path());

    assert!(add_edge(&store, "isa Goat Mammal"));
    failing.store(true, Ordering::SeqCst);
    assert!(matches!(store.save_state(), Err(Error::Module(_))));
    assert_eq!(read_tree(dir.path()), before);
    drop(store);

    // The reopened store is the last good save, and Goat is interned once.
    let store = GraphStore::open(config(dir.path(), Codec::Bincode)).unwrap();
    assert_eq!(store.node_count(), 5);
    assert_eq!(store.edge_count(), 3);
    assert!(store.find_or_create_node("Goat", None, false, true, false).is_none());
    assert!(add_edge(&store, "isa Goat Mammal"));
    assert!(!add_edge(&store, "isa Goat Mammal"));
    assert_eq!(store.node_count(), 6);
}

// ============================================================================
// 2. Recovery
// ============================================================================

#[test]
fn test_stale_module_blobs_are_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let modules = dir.path().join("modules");
    let stale = {
        let store = GraphStore::open(config(dir.path(), Codec::Bincode)).unwrap();
        populate(&store);
        store.save_state().unwrap();
        let stale: Vec<(PathBuf, Vec<u8>)> = ["RelatedEdgeIndex", "NodeAliasIndex"]
            .iter()
            .map(|name| (modules.join(name), fs::read(modules.join(name)).unwrap()))
            .collect();
        assert!(add_edge(&store, "isa Goat Mammal"));
        store.save_state().unwrap();
        stale
    };
    for (path, bytes) in &stale {
        fs::write(path, bytes).unwrap();
    }

    let store = GraphStore::open(config(dir.path(), Codec::Bincode)).unwrap();
    let goat = store.find_or_create_node("Goat", None, false, true, false).unwrap();
    let mammal = store.find_or_create_node("Mammal", None, false, true, false).unwrap();
    let index = store.get_module::<RelatedEdgeIndex>().unwrap();
    assert_eq!(index.query(&args![&mammal, 3]).unwrap().len(), 3);
    assert_eq!(index.query(&args![&goat]).unwrap().len(), 1);
    assert!(!add_edge(&store, "isa Goat Mammal"));
    assert_eq!(store.node_count(), 6);
    assert_eq!(store.edge_count(), 4);
}

#[test]
fn test_unreadable_tables_start_empty() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(NODE_FILE), b"not a node table").unwrap();
    fs::write(dir.path().join(EDGE_FILE), b"\x00\x01garbage").unwrap();

    let store = GraphStore::open(config(dir.path(), Codec::Bincode)).unwrap();
    assert_eq!(store.node_count(), 0);
    assert_eq!(store.edge_count(), 0);
    populate(&store);
    assert_eq!(store.edge_count(), 3);
}

#[test]
fn test_corrupt_module_blob_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = GraphStore::open(config(dir.path(), Codec::Bincode)).unwrap();
        populate(&store);
        store.save_state().unwrap();
    }
    fs::write(dir.path().join("modules").join("RelatedEdgeIndex"), b"\xff\xff").unwrap();

    let store = GraphStore::open(config(dir.path(), Codec::Bincode)).unwrap();
    let cow = store.find_or_create_node("Cow", None, false, true, false).unwrap();
    let index = store.get_module::<RelatedEdgeIndex>().unwrap();
    assert_eq!(index.query(&args![&cow]).unwrap().len(), 2);
}

#[test]
fn test_module_list_controls_modules() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(MODULE_LIST_FILE),
        "% only the alias index\ndag_rs::module::NodeAliasIndex\nno::such::Module\n",
    )
    .unwrap();

    let store = GraphStore::open(config(dir.path(), Codec::Bincode)).unwrap();
    let names: Vec<String> = store.modules().iter().map(|m| m.name().to_string()).collect();
    assert_eq!(names, vec!["NodeAliasIndex".to_string()]);
    assert!(store.get_module::<RelatedEdgeIndex>().is_none());

    // Edge identity still holds through the scan fallback.
    let nodes = store.parse_nodes("isa Cow Mammal", None, true, false).unwrap();
    assert!(store.find_or_create_edge(None, false, &nodes).unwrap().is_created());
    assert!(!store.find_or_create_edge(None, false, &nodes).unwrap().is_created());
}

#[test]
fn test_module_list_is_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let _store = GraphStore::open(config(dir.path(), Codec::Bincode)).unwrap();
    let text = fs::read_to_string(dir.path().join(MODULE_LIST_FILE)).unwrap();
    assert!(text.contains(RelatedEdgeIndex::IDENTIFIER));
    assert!(text.lines().any(|l| l == "dag_rs::module::NodeAliasIndex"));
}
