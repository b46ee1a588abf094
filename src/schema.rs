use rusqlite::{Connection, OptionalExtension};

use crate::errors::DocGraphError;

pub const SCHEMA_VERSION: i64 = 1;

pub fn ensure_schema(conn: &Connection) -> Result<(), DocGraphError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS doc_collections (
            database   TEXT NOT NULL,
            name       TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (database, name)
        );
        CREATE TABLE IF NOT EXISTS doc_documents (
            seq        INTEGER PRIMARY KEY AUTOINCREMENT,
            database   TEXT NOT NULL,
            collection TEXT NOT NULL,
            body       BLOB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_collection
            ON doc_documents(database, collection, seq);
        CREATE TABLE IF NOT EXISTS doc_meta (
            id             INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL
        );
        "#,
    )
    .map_err(|e| DocGraphError::schema(e.to_string()))?;
    ensure_meta(conn)
}

fn ensure_meta(conn: &Connection) -> Result<(), DocGraphError> {
    let existing: Option<i64> = conn
        .query_row("SELECT schema_version FROM doc_meta WHERE id=1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| DocGraphError::schema(e.to_string()))?;
    match existing {
        None => {
            conn.execute(
                "INSERT INTO doc_meta(id, schema_version) VALUES(1, ?1)",
                [SCHEMA_VERSION],
            )
            .map_err(|e| DocGraphError::schema(e.to_string()))?;
            Ok(())
        }
        Some(version) if version > SCHEMA_VERSION => Err(DocGraphError::schema(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
        ))),
        Some(_) => Ok(()),
    }
}

pub fn read_schema_version(conn: &Connection) -> Result<i64, DocGraphError> {
    conn.query_row(
        "SELECT schema_version FROM doc_meta WHERE id=1",
        [],
        |row| row.get(0),
    )
    .map_err(|e| DocGraphError::schema(e.to_string()))
}
