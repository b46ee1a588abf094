//! Whole-database snapshots and the destructive maintenance operations around them.
//!
//! A snapshot is one JSON object keyed by collection name whose values are the
//! collection's documents in canonical extended JSON, so identifiers, dates and the
//! width of every number come back with the same BSON type on restore.
//!
//! Restore is not atomic. Each collection is decoded before it is cleared, so a
//! malformed collection leaves its current contents alone, but a failure halfway
//! through the file leaves earlier collections already replaced.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use bson::{Bson, Document};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::{
    backend::{Filter, FindOptions},
    connection::Connection,
    errors::DocGraphError,
};

pub const DEFAULT_SNAPSHOT_PREFIX: &str = "snapshot";
pub const DEFAULT_SNAPSHOT_DIR: &str = "backups";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// File name prefix; the file is `<prefix>_<YYYYMMDD_HHMMSS>.json`.
    pub prefix: String,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
        }
    }
}

impl SnapshotOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

/// Documents restored per collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub collections: BTreeMap<String, usize>,
}

impl RestoreReport {
    pub fn documents(&self) -> usize {
        self.collections.values().sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub collections: Vec<String>,
    pub counts: BTreeMap<String, u64>,
}

impl DatabaseStats {
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Snapshot file name for `prefix` at the current local time.
pub fn snapshot_file_name(prefix: &str) -> String {
    format!(
        "{prefix}_{}.json",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Writes a snapshot of every collection into `directory`, creating it when needed.
///
/// Two snapshots taken within the same second with the same prefix share a file
/// name; the later one wins.
pub fn create_snapshot<P: AsRef<Path>>(
    conn: &Connection,
    directory: P,
    options: &SnapshotOptions,
) -> Result<PathBuf, DocGraphError> {
    let directory = directory.as_ref();
    fs::create_dir_all(directory).map_err(|e| {
        DocGraphError::io(format!(
            "failed to create snapshot directory {}: {e}",
            directory.display()
        ))
    })?;
    let path = directory.join(snapshot_file_name(&options.prefix));
    let file = File::create(&path)
        .map_err(|e| DocGraphError::io(format!("{}: {e}", path.display())))?;
    let documents = dump_snapshot_to_writer(conn, BufWriter::new(file))?;
    info!(path = %path.display(), documents, "database snapshot saved");
    Ok(path)
}

/// Serializes every collection to `writer`; returns the number of documents written.
pub fn dump_snapshot_to_writer<W: Write>(
    conn: &Connection,
    mut writer: W,
) -> Result<usize, DocGraphError> {
    let mut names = conn.list_collection_names()?;
    names.sort();
    let mut snapshot = Map::new();
    let mut written = 0;
    for name in names {
        let documents = conn
            .collection(&name)
            .find(&Filter::All, &FindOptions::default())?;
        debug!(collection = %name, documents = documents.len(), "dumping collection");
        written += documents.len();
        let encoded: Vec<Value> = documents
            .into_iter()
            .map(|document| Bson::Document(document).into_canonical_extjson())
            .collect();
        snapshot.insert(name, Value::Array(encoded));
    }
    serde_json::to_writer_pretty(&mut writer, &Value::Object(snapshot))
        .map_err(|e| DocGraphError::io(e.to_string()))?;
    writeln!(writer).map_err(|e| DocGraphError::io(e.to_string()))?;
    writer.flush().map_err(|e| DocGraphError::io(e.to_string()))?;
    Ok(written)
}

/// Replaces the contents of every collection named in the snapshot at `path`.
///
/// Collections absent from the file are left untouched.
pub fn restore_snapshot<P: AsRef<Path>>(
    conn: &Connection,
    path: P,
) -> Result<RestoreReport, DocGraphError> {
    let path = path.as_ref();
    if !path.is_file() {
        error!(path = %path.display(), "snapshot file not found");
        return Err(DocGraphError::snapshot_not_found(path.display().to_string()));
    }
    let file = File::open(path)
        .map_err(|e| DocGraphError::io(format!("{}: {e}", path.display())))?;
    let report = load_snapshot_from_reader(conn, BufReader::new(file))?;
    info!(
        path = %path.display(),
        collections = report.collections.len(),
        documents = report.documents(),
        "database restored from snapshot"
    );
    Ok(report)
}

fn decode_collection(name: &str, value: Value) -> Result<Vec<Document>, DocGraphError> {
    let Value::Array(items) = value else {
        return Err(DocGraphError::invalid_input(format!(
            "snapshot collection '{name}' is not an array"
        )));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match Bson::try_from(item) {
            Ok(Bson::Document(document)) => Ok(document),
            Ok(_) => Err(DocGraphError::invalid_input(format!(
                "snapshot collection '{name}' entry {index} is not a document"
            ))),
            Err(e) => Err(DocGraphError::invalid_input(format!(
                "snapshot collection '{name}' entry {index}: {e}"
            ))),
        })
        .collect()
}

pub fn load_snapshot_from_reader<R: Read>(
    conn: &Connection,
    reader: R,
) -> Result<RestoreReport, DocGraphError> {
    let parsed: Value = serde_json::from_reader(reader)
        .map_err(|e| DocGraphError::invalid_input(format!("malformed snapshot: {e}")))?;
    let Value::Object(collections) = parsed else {
        return Err(DocGraphError::invalid_input(
            "snapshot must be an object keyed by collection name",
        ));
    };

    let mut report = RestoreReport::default();
    for (name, value) in collections {
        let documents = decode_collection(&name, value)?;
        let collection = conn.collection(&name);
        let cleared = collection.delete_many(&Filter::All)?;
        let restored = collection.insert_many(documents)?;
        debug!(collection = %name, cleared, restored, "collection repopulated");
        report.collections.insert(name, restored);
    }
    Ok(report)
}

pub fn database_stats(conn: &Connection) -> Result<DatabaseStats, DocGraphError> {
    let mut stats = DatabaseStats {
        collections: conn.list_collection_names()?,
        counts: BTreeMap::new(),
    };
    stats.collections.sort();
    for name in &stats.collections {
        let count = conn.collection(name).count_documents(&Filter::All)?;
        stats.counts.insert(name.clone(), count);
    }
    debug!(collections = stats.collections.len(), total = stats.total(), "database stats");
    Ok(stats)
}

/// Drops the named database. Irreversible; take a snapshot first.
pub fn drop_database(conn: &Connection, name: &str) -> Result<(), DocGraphError> {
    warn!(database = name, "dropping database");
    conn.drop_database(name)?;
    info!(database = name, "database dropped");
    Ok(())
}

/// Deletes every document of `collection` and returns how many were removed.
pub fn clear_collection(conn: &Connection, collection: &str) -> Result<u64, DocGraphError> {
    warn!(collection, "clearing collection");
    let cleared = conn.collection(collection).delete_many(&Filter::All)?;
    info!(collection, cleared, "collection cleared");
    Ok(cleared)
}

/// Clears every collection of the database; returns the per-collection counts.
pub fn clear_all_collections(conn: &Connection) -> Result<BTreeMap<String, u64>, DocGraphError> {
    let mut cleared = BTreeMap::new();
    for name in conn.list_collection_names()? {
        let count = clear_collection(conn, &name)?;
        cleared.insert(name, count);
    }
    Ok(cleared)
}
