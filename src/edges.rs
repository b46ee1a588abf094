//! Edges are embedded in the source node's `connections` array; there is no edge
//! collection and no inbound index.

use bson::{Bson, Document, doc, oid::ObjectId};
use tracing::{debug, info};

use crate::{
    backend::{Filter, Update},
    connection::{Collection, Connection},
    errors::DocGraphError,
    model::{CONNECTIONS, NODES},
};

pub struct EdgeRepository<'a> {
    conn: &'a Connection,
}

impl<'a> EdgeRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn nodes(&self) -> Collection<'a> {
        self.conn.collection(NODES)
    }

    /// Appends `{to_node: to, ..properties}` to `from`'s connections.
    ///
    /// Returns `false` when `from` does not exist. `to` is a weak reference and is
    /// never checked.
    pub fn add_edge(
        &self,
        from: ObjectId,
        to: ObjectId,
        properties: Option<Document>,
    ) -> Result<bool, DocGraphError> {
        let mut edge = doc! { "to_node": to };
        if let Some(properties) = properties {
            for (key, value) in properties {
                if key != "to_node" {
                    edge.insert(key, value);
                }
            }
        }
        let outcome = self.nodes().update_one(
            &Filter::eq("_id", from),
            &Update::Push {
                field: CONNECTIONS.to_string(),
                value: Bson::Document(edge),
            },
        )?;
        let added = outcome.modified > 0;
        info!(%from, %to, added, "edge add");
        Ok(added)
    }

    /// Outbound edges of `node`; empty when the node or its list is missing.
    pub fn get_connections(&self, node: ObjectId) -> Result<Vec<Document>, DocGraphError> {
        let Some(document) = self.nodes().find_one(&Filter::eq("_id", node))? else {
            debug!(%node, "connections requested for missing node");
            return Ok(Vec::new());
        };
        let edges: Vec<Document> = match document.get(CONNECTIONS) {
            Some(Bson::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_document().cloned())
                .collect(),
            _ => Vec::new(),
        };
        debug!(%node, count = edges.len(), "connections");
        Ok(edges)
    }

    /// Removes every edge from `from` to `to`. Idempotent: a second call returns `false`.
    pub fn remove_edge(&self, from: ObjectId, to: ObjectId) -> Result<bool, DocGraphError> {
        let outcome = self.nodes().update_one(
            &Filter::eq("_id", from),
            &Update::Pull {
                field: CONNECTIONS.to_string(),
                matching: doc! { "to_node": to },
            },
        )?;
        let removed = outcome.modified > 0;
        info!(%from, %to, removed, "edge remove");
        Ok(removed)
    }
}
