//! Node CRUD operations.

use bson::{Bson, Document, oid::ObjectId};
use tracing::{debug, info};

use crate::{
    backend::{Filter, FindOptions, SortDirection, Update},
    connection::{Collection, Connection},
    errors::DocGraphError,
    model::{CONNECTIONS, NODES, NOTES, document_from_json},
};

/// Optional cursor shaping for [`NodeRepository::list`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListOptions {
    pub limit: Option<i64>,
    pub sort_field: Option<String>,
    pub sort_direction: SortDirection,
}

impl ListOptions {
    pub fn sorted_by(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            limit: None,
            sort_field: Some(field.into()),
            sort_direction: direction,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Fails unless `document` carries a string `name`.
pub(crate) fn require_name(document: &Document) -> Result<&str, DocGraphError> {
    match document.get("name") {
        Some(Bson::String(name)) if !name.is_empty() => Ok(name),
        Some(Bson::String(_)) => Err(DocGraphError::validation("node 'name' must not be empty")),
        Some(_) => Err(DocGraphError::validation("node 'name' must be a string")),
        None => Err(DocGraphError::validation(
            "node data must contain a 'name' field",
        )),
    }
}

/// Adds empty `connections` / `next_interaction_notes` arrays when absent.
pub(crate) fn with_default_lists(mut document: Document) -> Document {
    if !document.contains_key(CONNECTIONS) {
        document.insert(CONNECTIONS, Bson::Array(Vec::new()));
    }
    if !document.contains_key(NOTES) {
        document.insert(NOTES, Bson::Array(Vec::new()));
    }
    document
}

/// Repository over the `nodes` collection.
pub struct NodeRepository<'a> {
    conn: &'a Connection,
}

impl<'a> NodeRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn nodes(&self) -> Collection<'a> {
        self.conn.collection(NODES)
    }

    /// Inserts a node and returns its new identifier.
    pub fn add(&self, document: Document) -> Result<Bson, DocGraphError> {
        let name = require_name(&document)?.to_string();
        let id = self.nodes().insert_one(with_default_lists(document))?;
        info!(name = %name, id = %id, "node inserted");
        Ok(id)
    }

    /// Like [`NodeRepository::add`] for untyped input; non-objects are a type error.
    pub fn add_value(&self, value: serde_json::Value) -> Result<Bson, DocGraphError> {
        self.add(document_from_json(value)?)
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Document>, DocGraphError> {
        let node = self.nodes().find_one(&Filter::eq("name", name))?;
        match &node {
            Some(_) => debug!(name, "retrieved node"),
            None => debug!(name, "node not found"),
        }
        Ok(node)
    }

    pub fn get_by_id(&self, id: ObjectId) -> Result<Option<Document>, DocGraphError> {
        let node = self.nodes().find_one(&Filter::eq("_id", id))?;
        debug!(%id, found = node.is_some(), "lookup by id");
        Ok(node)
    }

    /// Applies a field-level merge and returns the number of modified documents.
    pub fn update(&self, id: ObjectId, fields: Document) -> Result<u64, DocGraphError> {
        if fields.is_empty() {
            return Err(DocGraphError::validation("no updates provided"));
        }
        let outcome = self
            .nodes()
            .update_one(&Filter::eq("_id", id), &Update::Set(fields))?;
        info!(%id, modified = outcome.modified, "node updated");
        Ok(outcome.modified)
    }

    pub fn delete_by_name(&self, name: &str) -> Result<u64, DocGraphError> {
        let deleted = self.nodes().delete_one(&Filter::eq("name", name))?;
        info!(name, deleted, "node delete");
        Ok(deleted)
    }

    pub fn list(&self, options: &ListOptions) -> Result<Vec<Document>, DocGraphError> {
        let find = FindOptions {
            sort: options
                .sort_field
                .clone()
                .map(|field| (field, options.sort_direction)),
            limit: options.limit,
        };
        let nodes = self.nodes().find(&Filter::All, &find)?;
        debug!(count = nodes.len(), "listed nodes");
        Ok(nodes)
    }

    pub fn count(&self) -> Result<u64, DocGraphError> {
        self.nodes().count_documents(&Filter::All)
    }
}
