use docgraph::{
    DocGraphError,
    schema::{SCHEMA_VERSION, ensure_schema, read_schema_version},
};
use rusqlite::Connection;

#[test]
fn test_schema_creates_document_tables() {
    let conn = Connection::open_in_memory().unwrap();
    ensure_schema(&conn).unwrap();
    assert!(table_exists(&conn, "doc_collections"));
    assert!(table_exists(&conn, "doc_documents"));
    assert!(table_exists(&conn, "doc_meta"));
    assert_eq!(read_schema_version(&conn).unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_schema_is_idempotent() {
    let conn = Connection::open_in_memory().unwrap();
    ensure_schema(&conn).unwrap();
    ensure_schema(&conn).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM doc_meta", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn test_newer_schema_version_is_refused() {
    let conn = Connection::open_in_memory().unwrap();
    ensure_schema(&conn).unwrap();
    conn.execute(
        "UPDATE doc_meta SET schema_version=?1 WHERE id=1",
        [SCHEMA_VERSION + 1],
    )
    .unwrap();
    let err = ensure_schema(&conn).unwrap_err();
    assert!(matches!(err, DocGraphError::SchemaError(_)));
}

fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.prepare("SELECT name FROM sqlite_master WHERE name=?1")
        .unwrap()
        .exists([name])
        .unwrap()
}
