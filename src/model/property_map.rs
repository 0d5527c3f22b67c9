//! PropertyMap: the string key-value store on concepts and edges.

use std::collections::BTreeMap;

/// A map of property names to values.
///
/// Ordered so that persisted tables are byte-stable across saves.
pub type PropertyMap = BTreeMap<String, String>;
