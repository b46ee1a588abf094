//! Bulk import and export of node documents.
//!
//! Import applies one policy to every record whatever the source format: a record
//! without a usable `name` fails, a record whose name already exists is skipped (or
//! replaced in update mode), anything else is inserted. A failing record is counted and
//! the batch continues. Unreadable input or a lost connection aborts the whole import.

mod export;
mod import;

use bson::{Bson, Document};
use serde::Serialize;
use tracing::{error, warn};

pub use export::{
    export_nodes_to_csv_path, export_nodes_to_csv_writer, export_nodes_to_json_path,
    export_nodes_to_json_writer,
};
pub use import::{
    coerce_csv_value, import_nodes_from_csv_path, import_nodes_from_csv_reader,
    import_nodes_from_json_path, import_nodes_from_json_reader,
};

use crate::{
    backend::Filter,
    connection::Collection,
    errors::DocGraphError,
    model::{CONNECTIONS, NOTES},
    nodes::{require_name, with_default_lists},
};

/// Import behaviour switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Replace nodes whose name already exists instead of skipping them.
    pub update_existing: bool,
}

impl ImportOptions {
    pub fn updating() -> Self {
        Self {
            update_existing: true,
        }
    }
}

/// Per-outcome record counts of one import run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.added + self.updated + self.skipped + self.failed
    }

    fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Added => self.added += 1,
            RecordOutcome::Updated => self.updated += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecordOutcome {
    Added,
    Updated,
    Skipped,
    Failed,
}

/// Applies the import policy to one record. Connectivity loss is returned as an error
/// so the caller aborts the batch; any other store failure only fails this record.
fn import_record(
    nodes: &Collection<'_>,
    mut document: Document,
    options: ImportOptions,
) -> Result<RecordOutcome, DocGraphError> {
    let name = match require_name(&document) {
        Ok(name) => name.to_string(),
        Err(err) => {
            warn!(%err, "import record rejected");
            return Ok(RecordOutcome::Failed);
        }
    };

    let existing = match nodes.find_one(&Filter::eq("name", name.as_str())) {
        Ok(existing) => existing,
        Err(err) => return record_failure(&name, err, "import lookup failed"),
    };

    match existing {
        Some(_) if !options.update_existing => {
            warn!(name = %name, "node exists, skipping");
            Ok(RecordOutcome::Skipped)
        }
        Some(existing) => {
            let id = existing.get("_id").cloned().unwrap_or(Bson::Null);
            document.remove("_id");
            for key in [CONNECTIONS, NOTES] {
                if !document.contains_key(key) {
                    if let Some(kept) = existing.get(key) {
                        document.insert(key, kept.clone());
                    }
                }
            }
            match nodes.replace_one(&Filter::eq("_id", id), document) {
                Ok(outcome) if outcome.modified > 0 => Ok(RecordOutcome::Updated),
                Ok(_) => Ok(RecordOutcome::Skipped),
                Err(err) => record_failure(&name, err, "import replace failed"),
            }
        }
        None => match nodes.insert_one(with_default_lists(document)) {
            Ok(_) => Ok(RecordOutcome::Added),
            Err(err) => record_failure(&name, err, "import insert failed"),
        },
    }
}

fn record_failure(
    name: &str,
    err: DocGraphError,
    message: &'static str,
) -> Result<RecordOutcome, DocGraphError> {
    error!(name, %err, "{message}");
    match err {
        DocGraphError::ConnectionError(_) => Err(err),
        _ => Ok(RecordOutcome::Failed),
    }
}
