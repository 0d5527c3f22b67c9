//! # Storage
//!
//! Everything below the store's mutation protocol: the id-indexed entity
//! tables, their persisted record forms, the codec, and the root-directory
//! layout.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `table` | `EntityTable` / `EntityTables`: O(1) id lookup, id counters |
//! | `record` | `NodeRecord` / `EdgeRecord`: serde forms of table entities |
//! | `codec` | `Codec`: bincode or JSON, atomic file writes |
//! | `layout` | file names, globals file, module list file |

pub mod table;
pub mod record;
pub mod codec;
pub mod layout;

pub use table::{EntityTable, EntityTables, TableEntity};
pub use record::{NodeRecord, EdgeRecord};
pub use codec::Codec;
pub use layout::{Globals, StoreLayout};
