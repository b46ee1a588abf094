//! Node and edge documents over MongoDB or an embedded SQLite document store.
//!
//! Every operation takes an explicit [`Connection`]; repositories borrow it and never
//! open connections of their own. Snapshots round-trip identifiers and dates through
//! canonical extended JSON.

pub mod backend;
pub mod config;
pub mod connection;
pub mod edges;
pub mod errors;
pub mod model;
pub mod nodes;
pub mod notes;
pub mod schema;
pub mod snapshot;
pub mod transfer;

#[cfg(feature = "mongodb")]
pub use crate::backend::MongoStore;
pub use crate::backend::{
    DocumentStore, Filter, FindOptions, SortDirection, SqliteStore, Update, UpdateOutcome,
};
pub use crate::config::{BackendKind, MongoConfig, SqliteConfig, StoreConfig};
pub use crate::connection::{Collection, Connection};
pub use crate::edges::EdgeRepository;
pub use crate::errors::DocGraphError;
pub use crate::model::{Edge, Node, Note, document_from_json, parse_object_id};
pub use crate::nodes::{ListOptions, NodeRepository};
pub use crate::notes::NoteRepository;
pub use crate::snapshot::{
    DatabaseStats, RestoreReport, SnapshotOptions, clear_all_collections, clear_collection,
    create_snapshot, database_stats, drop_database, restore_snapshot,
};
pub use crate::transfer::{ImportOptions, ImportSummary};
