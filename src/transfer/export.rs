use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use bson::{Bson, Document};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    backend::{Filter, FindOptions, eval::lookup},
    connection::Connection,
    errors::DocGraphError,
    model::{CONNECTIONS, NODES},
};

fn create(path: &Path) -> Result<BufWriter<File>, DocGraphError> {
    let file = File::create(path)
        .map_err(|e| DocGraphError::io(format!("{}: {e}", path.display())))?;
    Ok(BufWriter::new(file))
}

fn all_nodes(conn: &Connection) -> Result<Vec<Document>, DocGraphError> {
    conn.collection(NODES)
        .find(&Filter::All, &FindOptions::default())
}

/// Hex-encodes identifiers when `include_ids`, removes them otherwise.
fn prepare_for_json(mut node: Document, include_ids: bool) -> Document {
    if include_ids {
        if let Some(Bson::ObjectId(id)) = node.get("_id") {
            let hex = id.to_hex();
            node.insert("_id", hex);
        }
    } else {
        node.remove("_id");
    }
    if let Ok(edges) = node.get_array_mut(CONNECTIONS) {
        for edge in edges.iter_mut() {
            let Bson::Document(edge) = edge else {
                continue;
            };
            if !include_ids {
                edge.remove("to_node");
            } else if let Some(Bson::ObjectId(target)) = edge.get("to_node") {
                let hex = target.to_hex();
                edge.insert("to_node", hex);
            }
        }
    }
    node
}

pub fn export_nodes_to_json_path<P: AsRef<Path>>(
    conn: &Connection,
    path: P,
    include_ids: bool,
) -> Result<usize, DocGraphError> {
    export_nodes_to_json_writer(conn, create(path.as_ref())?, include_ids)
}

/// Writes `{"nodes": [...]}` pretty printed and returns the node count.
pub fn export_nodes_to_json_writer<W: Write>(
    conn: &Connection,
    mut writer: W,
    include_ids: bool,
) -> Result<usize, DocGraphError> {
    let nodes: Vec<Value> = all_nodes(conn)?
        .into_iter()
        .map(|node| Bson::Document(prepare_for_json(node, include_ids)).into_relaxed_extjson())
        .collect();
    let count = nodes.len();
    serde_json::to_writer_pretty(&mut writer, &json!({ "nodes": nodes }))
        .map_err(|e| DocGraphError::io(e.to_string()))?;
    writeln!(writer).map_err(|e| DocGraphError::io(e.to_string()))?;
    writer.flush().map_err(|e| DocGraphError::io(e.to_string()))?;
    info!(count, include_ids, "exported nodes to JSON");
    Ok(count)
}

/// `name`, `type`, then every `properties` key seen on any node, sorted.
fn default_csv_fields(nodes: &[Document]) -> Vec<String> {
    let keys: BTreeSet<&str> = nodes
        .iter()
        .filter_map(|node| node.get_document("properties").ok())
        .flat_map(|properties| properties.keys().map(String::as_str))
        .collect();
    let mut fields = vec!["name".to_string(), "type".to_string()];
    fields.extend(keys.into_iter().map(|key| format!("properties.{key}")));
    fields
}

fn csv_cell(value: Option<&Bson>) -> String {
    match value {
        Some(Bson::String(s)) => s.clone(),
        Some(Bson::Int32(n)) => n.to_string(),
        Some(Bson::Int64(n)) => n.to_string(),
        Some(Bson::Double(f)) => format!("{f:?}"),
        Some(Bson::Boolean(b)) => b.to_string(),
        Some(Bson::ObjectId(id)) => id.to_hex(),
        Some(Bson::DateTime(at)) => at.try_to_rfc3339_string().unwrap_or_default(),
        _ => String::new(),
    }
}

pub fn export_nodes_to_csv_path<P: AsRef<Path>>(
    conn: &Connection,
    path: P,
    fields: Option<&[String]>,
) -> Result<usize, DocGraphError> {
    export_nodes_to_csv_writer(conn, create(path.as_ref())?, fields)
}

/// Writes one row per node over `fields` (dotted paths) or the default field set.
/// Nested and missing values are written as empty cells.
pub fn export_nodes_to_csv_writer<W: Write>(
    conn: &Connection,
    writer: W,
    fields: Option<&[String]>,
) -> Result<usize, DocGraphError> {
    let nodes = all_nodes(conn)?;
    let fields = match fields {
        Some(fields) if !fields.is_empty() => fields.to_vec(),
        _ => default_csv_fields(&nodes),
    };
    let csv_error = |e: csv::Error| DocGraphError::io(e.to_string());

    let mut out = csv::Writer::from_writer(writer);
    out.write_record(&fields).map_err(csv_error)?;
    for node in &nodes {
        let row: Vec<String> = fields
            .iter()
            .map(|field| csv_cell(lookup(node, field)))
            .collect();
        out.write_record(&row).map_err(csv_error)?;
    }
    out.flush().map_err(|e| DocGraphError::io(e.to_string()))?;
    info!(count = nodes.len(), columns = fields.len(), "exported nodes to CSV");
    Ok(nodes.len())
}
