//! Interaction notes queued on a node for its next interaction.

use bson::{Bson, Document, oid::ObjectId};
use tracing::{debug, info, warn};

use crate::{
    backend::{Filter, Update},
    connection::{Collection, Connection},
    errors::DocGraphError,
    model::{NODES, NOTES, Note},
};

const NO_EFFECT: &str = "No effect specified";

pub struct NoteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> NoteRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn nodes(&self) -> Collection<'a> {
        self.conn.collection(NODES)
    }

    /// Appends `note` to the node's queue; `false` when the node does not exist.
    pub fn add_note(&self, node: ObjectId, note: &Note) -> Result<bool, DocGraphError> {
        let outcome = self.nodes().update_one(
            &Filter::eq("_id", node),
            &Update::Push {
                field: NOTES.to_string(),
                value: note.to_bson()?,
            },
        )?;
        let added = outcome.modified > 0;
        info!(%node, added, "interaction note add");
        Ok(added)
    }

    /// Triggers every queued note and drops those flagged `clear_after_use`.
    ///
    /// Returns the triggered effects in queue order, or `None` when the node is
    /// missing or has never had a notes list.
    pub fn process_notes(&self, node: ObjectId) -> Result<Option<Vec<String>>, DocGraphError> {
        let filter = Filter::eq("_id", node);
        let Some(document) = self.nodes().find_one(&filter)? else {
            warn!(%node, "no interaction notes: node not found");
            return Ok(None);
        };
        let Some(queued) = document.get(NOTES) else {
            warn!(%node, "no interaction notes found");
            return Ok(None);
        };
        let queued = match queued {
            Bson::Array(items) => items.clone(),
            _ => {
                return Err(DocGraphError::validation(format!(
                    "'{NOTES}' of node {node} is not an array"
                )));
            }
        };

        let mut effects = Vec::with_capacity(queued.len());
        let mut remaining = Vec::new();
        for raw in queued {
            let (effect, clear) = match &raw {
                Bson::String(text) => (text.clone(), false),
                Bson::Document(note) => (
                    note_effect(note),
                    note.get("clear_after_use").is_some_and(truthy),
                ),
                _ => (NO_EFFECT.to_string(), false),
            };
            effects.push(effect);
            if !clear {
                remaining.push(raw);
            }
        }
        for effect in &effects {
            debug!(%node, effect = %effect, "triggered note");
        }

        let mut set = Document::new();
        set.insert(NOTES, Bson::Array(remaining));
        self.nodes().update_one(&filter, &Update::Set(set))?;
        info!(%node, triggered = effects.len(), "interaction notes processed");
        Ok(Some(effects))
    }
}

/// Text announced for a structured note; non-string effects are rendered as BSON.
fn note_effect(note: &Document) -> String {
    match note.get("effect") {
        None | Some(Bson::Null) => NO_EFFECT.to_string(),
        Some(Bson::String(effect)) => effect.clone(),
        Some(other) => other.to_string(),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::String(text) => !text.is_empty(),
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}
