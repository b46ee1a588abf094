//! Typed views over node documents.
//!
//! Repositories work on raw [`Document`]s so unknown fields survive every round
//! trip; these types are for callers that want structure.

use bson::{Bson, Document, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::errors::DocGraphError;

pub const NODES: &str = "nodes";
pub const DEFAULT_NODE_TYPE: &str = "generic";
pub const CONNECTIONS: &str = "connections";
pub const NOTES: &str = "next_interaction_notes";

/// A named domain object stored in the `nodes` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Document>,
    #[serde(default)]
    pub connections: Vec<Edge>,
    #[serde(default)]
    pub next_interaction_notes: Vec<Note>,
    /// Every other top-level field.
    #[serde(flatten)]
    pub extra: Document,
}

impl Node {
    pub fn kind_or_default(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_NODE_TYPE)
    }

    pub fn from_document(document: Document) -> Result<Self, DocGraphError> {
        bson::from_document(document).map_err(|e| DocGraphError::validation(e.to_string()))
    }
}

/// Directed connection embedded in the source node's `connections` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Weak reference; never checked against existing nodes.
    pub to_node: Bson,
    #[serde(flatten)]
    pub properties: Document,
}

/// Entry of `next_interaction_notes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Note {
    Text(String),
    Structured {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trigger: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        effect: Option<String>,
        #[serde(default)]
        clear_after_use: bool,
    },
}

impl Note {
    pub fn structured(
        trigger: impl Into<String>,
        effect: impl Into<String>,
        clear_after_use: bool,
    ) -> Self {
        Note::Structured {
            trigger: Some(trigger.into()),
            effect: Some(effect.into()),
            clear_after_use,
        }
    }

    pub fn to_bson(&self) -> Result<Bson, DocGraphError> {
        bson::to_bson(self).map_err(|e| DocGraphError::invalid_input(e.to_string()))
    }
}

/// Parses a 24-character hex identifier.
pub fn parse_object_id(raw: &str) -> Result<ObjectId, DocGraphError> {
    ObjectId::parse_str(raw.trim())
        .map_err(|e| DocGraphError::invalid_id(format!("'{raw}' is not a valid identifier: {e}")))
}

/// Converts a JSON value to a document, honouring extended JSON (`{"$oid": ..}`).
pub fn document_from_json(value: serde_json::Value) -> Result<Document, DocGraphError> {
    if !value.is_object() {
        return Err(DocGraphError::type_error(
            "node data must be a JSON object",
        ));
    }
    match Bson::try_from(value) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(_) => Err(DocGraphError::type_error("node data must be a JSON object")),
        Err(e) => Err(DocGraphError::invalid_input(e.to_string())),
    }
}
