use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use bson::{Bson, Document};
use serde_json::Value;
use tracing::{info, warn};

use super::{ImportOptions, ImportSummary, RecordOutcome, import_record};
use crate::{connection::Connection, errors::DocGraphError, model::NODES};

fn open(path: &Path) -> Result<BufReader<File>, DocGraphError> {
    let file = File::open(path)
        .map_err(|e| DocGraphError::io(format!("{}: {e}", path.display())))?;
    Ok(BufReader::new(file))
}

pub fn import_nodes_from_json_path<P: AsRef<Path>>(
    conn: &Connection,
    path: P,
    options: ImportOptions,
) -> Result<ImportSummary, DocGraphError> {
    import_nodes_from_json_reader(conn, open(path.as_ref())?, options)
}

/// Imports a bare JSON array of nodes or an object with a `nodes` array.
///
/// Values are read as extended JSON, so `{"$oid": ..}` and `{"$date": ..}` come back
/// typed.
pub fn import_nodes_from_json_reader<R: Read>(
    conn: &Connection,
    reader: R,
    options: ImportOptions,
) -> Result<ImportSummary, DocGraphError> {
    let parsed: Value = serde_json::from_reader(reader)
        .map_err(|e| DocGraphError::invalid_input(format!("malformed JSON: {e}")))?;
    let records = match parsed {
        Value::Array(records) => records,
        Value::Object(mut object) => match object.remove("nodes") {
            Some(Value::Array(records)) => records,
            _ => {
                return Err(DocGraphError::invalid_input(
                    "expected an array of nodes or an object with a 'nodes' array",
                ));
            }
        },
        _ => {
            return Err(DocGraphError::invalid_input(
                "expected an array of nodes or an object with a 'nodes' array",
            ));
        }
    };

    let nodes = conn.collection(NODES);
    let mut summary = ImportSummary::default();
    for (index, record) in records.into_iter().enumerate() {
        let outcome = match record {
            Value::Object(_) => match Bson::try_from(record) {
                Ok(Bson::Document(document)) => import_record(&nodes, document, options)?,
                Ok(_) => RecordOutcome::Failed,
                Err(err) => {
                    warn!(index, %err, "unreadable import record");
                    RecordOutcome::Failed
                }
            },
            _ => {
                warn!(index, "import record is not an object");
                RecordOutcome::Failed
            }
        };
        summary.record(outcome);
    }
    info!(?summary, "JSON import finished");
    Ok(summary)
}

pub fn import_nodes_from_csv_path<P: AsRef<Path>>(
    conn: &Connection,
    path: P,
    options: ImportOptions,
) -> Result<ImportSummary, DocGraphError> {
    import_nodes_from_csv_reader(conn, open(path.as_ref())?, options)
}

/// Imports CSV rows; every column other than `name` and `type` goes under
/// `properties`, with values passed through [`coerce_csv_value`]. Empty cells are
/// left out.
pub fn import_nodes_from_csv_reader<R: Read>(
    conn: &Connection,
    reader: R,
    options: ImportOptions,
) -> Result<ImportSummary, DocGraphError> {
    let mut rows = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers: Vec<String> = rows
        .headers()
        .map_err(|e| DocGraphError::invalid_input(format!("malformed CSV header: {e}")))?
        .iter()
        .map(String::from)
        .collect();
    if !headers.iter().any(|h| h == "name") {
        return Err(DocGraphError::invalid_input(
            "CSV header must contain a 'name' column",
        ));
    }

    let nodes = conn.collection(NODES);
    let mut summary = ImportSummary::default();
    for (line, row) in rows.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!(line = line + 2, %err, "unreadable CSV row");
                summary.record(RecordOutcome::Failed);
                continue;
            }
        };
        let mut document = Document::new();
        let mut properties = Document::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            match header.as_str() {
                "name" => {
                    document.insert("name", cell);
                }
                "type" if !cell.is_empty() => {
                    document.insert("type", cell);
                }
                "type" => {}
                _ if cell.is_empty() => {}
                key => {
                    properties.insert(key, coerce_csv_value(cell));
                }
            }
        }
        if !properties.is_empty() {
            document.insert("properties", properties);
        }
        summary.record(import_record(&nodes, document, options)?);
    }
    info!(?summary, "CSV import finished");
    Ok(summary)
}

/// Types a CSV cell: all-digit text becomes Int32 (Int64 when it does not fit), text
/// with exactly one `.` and digits otherwise becomes a double; the rest stays a string.
///
/// Leading zeros are not protected, so a zip code like `02134` turns into `2134`.
pub fn coerce_csv_value(raw: &str) -> Bson {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if all_digits(raw) {
        if let Ok(value) = raw.parse::<i32>() {
            return Bson::Int32(value);
        }
        if let Ok(value) = raw.parse::<i64>() {
            return Bson::Int64(value);
        }
        return Bson::String(raw.to_string());
    }
    if raw.matches('.').count() == 1 && all_digits(&raw.replacen('.', "", 1)) {
        if let Ok(value) = raw.parse::<f64>() {
            return Bson::Double(value);
        }
    }
    Bson::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_become_integers() {
        assert_eq!(coerce_csv_value("42"), Bson::Int32(42));
        assert_eq!(coerce_csv_value("02134"), Bson::Int32(2134));
        assert_eq!(coerce_csv_value("9000000000"), Bson::Int64(9_000_000_000));
        assert_eq!(
            coerce_csv_value("99999999999999999999"),
            Bson::String("99999999999999999999".into())
        );
    }

    #[test]
    fn single_decimal_point_becomes_double() {
        assert_eq!(coerce_csv_value("3.5"), Bson::Double(3.5));
        assert_eq!(coerce_csv_value(".5"), Bson::Double(0.5));
        assert_eq!(coerce_csv_value("1.2.3"), Bson::String("1.2.3".into()));
        assert_eq!(coerce_csv_value("."), Bson::String(".".into()));
    }

    #[test]
    fn signs_and_words_stay_strings() {
        assert_eq!(coerce_csv_value("-5"), Bson::String("-5".into()));
        assert_eq!(coerce_csv_value("north"), Bson::String("north".into()));
        assert_eq!(coerce_csv_value(""), Bson::String(String::new()));
    }
}
