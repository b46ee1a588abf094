//! Embedded document store on SQLite.
//!
//! Documents are stored as BSON blobs in insertion order; filters, updates and sort
//! orders are evaluated in-process by [`crate::backend::eval`]. Several logical
//! databases can share one SQLite file.

use std::{collections::HashSet, path::Path};

use bson::{Bson, Document, oid::ObjectId};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use tracing::debug;

use crate::{
    backend::{
        DocumentStore,
        eval::{apply_update, matches, sort_documents},
        types::{Filter, FindOptions, Update, UpdateOutcome},
    },
    config::BackendKind,
    errors::DocGraphError,
    schema::{ensure_schema, read_schema_version},
};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    database: String,
}

/// An unnamed main database means the connection lives in memory.
fn is_in_memory_connection(conn: &Connection) -> bool {
    match conn.pragma_query_value(None, "database_list", |row| {
        let name: String = row.get(2)?;
        Ok(name)
    }) {
        Ok(file) => file.is_empty(),
        Err(_) => true,
    }
}

fn encode(document: &Document) -> Result<Vec<u8>, DocGraphError> {
    bson::to_vec(document).map_err(|e| DocGraphError::invalid_input(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Document, DocGraphError> {
    bson::from_slice(bytes).map_err(|e| DocGraphError::query(format!("corrupt document: {e}")))
}

/// Puts a fresh ObjectId in front of documents that have no `_id`.
fn with_identifier(document: Document) -> (Document, Bson) {
    if let Some(id) = document.get("_id") {
        let id = id.clone();
        return (document, id);
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut stamped = Document::new();
    stamped.insert("_id", id.clone());
    for (key, value) in document {
        stamped.insert(key, value);
    }
    (stamped, id)
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P, database: &str) -> Result<Self, DocGraphError> {
        let conn =
            Connection::open(path).map_err(|e| DocGraphError::connection(e.to_string()))?;
        Self::from_connection(conn, database)
    }

    pub fn open_in_memory(database: &str) -> Result<Self, DocGraphError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DocGraphError::connection(e.to_string()))?;
        Self::from_connection(conn, database)
    }

    fn from_connection(conn: Connection, database: &str) -> Result<Self, DocGraphError> {
        conn.set_prepared_statement_cache_capacity(64);
        if !is_in_memory_connection(&conn) {
            if conn.pragma_update(None, "journal_mode", "WAL").is_err() {
                let _ = conn.pragma_update(None, "journal_mode", "DELETE");
            }
            let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        }
        ensure_schema(&conn)?;
        debug!(database, "opened sqlite document store");
        Ok(Self {
            conn: Mutex::new(conn),
            database: database.to_string(),
        })
    }

    /// Loads every document of a collection with its row sequence, in insertion order.
    fn load(
        &self,
        conn: &Connection,
        collection: &str,
    ) -> Result<Vec<(i64, Document)>, DocGraphError> {
        let mut stmt = conn
            .prepare_cached(
                "SELECT seq, body FROM doc_documents \
                 WHERE database=?1 AND collection=?2 ORDER BY seq",
            )
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![self.database, collection], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        let mut documents = Vec::new();
        for row in rows {
            let (seq, body) = row.map_err(|e| DocGraphError::query(e.to_string()))?;
            documents.push((seq, decode(&body)?));
        }
        Ok(documents)
    }

    fn load_matching(
        &self,
        conn: &Connection,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<(i64, Document)>, DocGraphError> {
        Ok(self
            .load(conn, collection)?
            .into_iter()
            .filter(|(_, document)| matches(document, filter))
            .collect())
    }

    fn insert_row(
        &self,
        conn: &Connection,
        collection: &str,
        document: &Document,
    ) -> Result<(), DocGraphError> {
        let body = encode(document)?;
        conn.prepare_cached(
            "INSERT OR IGNORE INTO doc_collections(database, name) VALUES(?1, ?2)",
        )
        .and_then(|mut stmt| stmt.execute(params![self.database, collection]))
        .map_err(|e| DocGraphError::query(e.to_string()))?;
        conn.prepare_cached(
            "INSERT INTO doc_documents(database, collection, body) VALUES(?1, ?2, ?3)",
        )
        .and_then(|mut stmt| stmt.execute(params![self.database, collection, body]))
        .map_err(|e| DocGraphError::query(e.to_string()))?;
        Ok(())
    }

    fn write_row(
        &self,
        conn: &Connection,
        seq: i64,
        document: &Document,
    ) -> Result<(), DocGraphError> {
        let body = encode(document)?;
        conn.execute(
            "UPDATE doc_documents SET body=?1 WHERE seq=?2",
            params![body, seq],
        )
        .map_err(|e| DocGraphError::query(e.to_string()))?;
        Ok(())
    }

    fn delete_row(&self, conn: &Connection, seq: i64) -> Result<(), DocGraphError> {
        conn.execute("DELETE FROM doc_documents WHERE seq=?1", params![seq])
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        Ok(())
    }

    fn ensure_unique_id(
        &self,
        conn: &Connection,
        collection: &str,
        id: &Bson,
    ) -> Result<(), DocGraphError> {
        let duplicate = self
            .load_matching(conn, collection, &Filter::Eq {
                field: "_id".into(),
                value: id.clone(),
            })?
            .into_iter()
            .next()
            .is_some();
        if duplicate {
            return Err(DocGraphError::query(format!(
                "duplicate key in {collection}: _id {id}"
            )));
        }
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    fn list_collection_names(&self) -> Result<Vec<String>, DocGraphError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT name FROM doc_collections WHERE database=?1 ORDER BY name")
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![self.database], |row| row.get::<_, String>(0))
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row.map_err(|e| DocGraphError::query(e.to_string()))?);
        }
        Ok(names)
    }

    fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, DocGraphError> {
        let (document, id) = with_identifier(document);
        let conn = self.conn.lock();
        self.ensure_unique_id(&conn, collection, &id)?;
        self.insert_row(&conn, collection, &document)?;
        Ok(id)
    }

    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, DocGraphError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        let mut seen: HashSet<String> = self
            .load(&tx, collection)?
            .into_iter()
            .filter_map(|(_, document)| document.get("_id").map(|id| id.to_string()))
            .collect();
        let mut inserted = 0;
        for document in documents {
            let (document, id) = with_identifier(document);
            if !seen.insert(id.to_string()) {
                return Err(DocGraphError::query(format!(
                    "duplicate key in {collection}: _id {id}"
                )));
            }
            self.insert_row(&tx, collection, &document)?;
            inserted += 1;
        }
        tx.commit()
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        Ok(inserted)
    }

    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DocGraphError> {
        let conn = self.conn.lock();
        Ok(self
            .load_matching(&conn, collection, filter)?
            .into_iter()
            .next()
            .map(|(_, document)| document))
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DocGraphError> {
        let conn = self.conn.lock();
        let mut documents: Vec<Document> = self
            .load_matching(&conn, collection, filter)?
            .into_iter()
            .map(|(_, document)| document)
            .collect();
        if let Some((field, direction)) = &options.sort {
            sort_documents(&mut documents, field, *direction);
        }
        match options.limit {
            Some(limit) if limit != 0 => documents.truncate(limit.unsigned_abs() as usize),
            _ => {}
        }
        Ok(documents)
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, DocGraphError> {
        let conn = self.conn.lock();
        let Some((seq, original)) = self
            .load_matching(&conn, collection, filter)?
            .into_iter()
            .next()
        else {
            return Ok(UpdateOutcome::default());
        };
        let mut updated = original.clone();
        apply_update(&mut updated, update)?;
        if updated == original {
            return Ok(UpdateOutcome {
                matched: 1,
                modified: 0,
            });
        }
        self.write_row(&conn, seq, &updated)?;
        Ok(UpdateOutcome {
            matched: 1,
            modified: 1,
        })
    }

    fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        replacement: Document,
    ) -> Result<UpdateOutcome, DocGraphError> {
        let conn = self.conn.lock();
        let Some((seq, original)) = self
            .load_matching(&conn, collection, filter)?
            .into_iter()
            .next()
        else {
            return Ok(UpdateOutcome::default());
        };
        let id = original.get("_id").cloned().unwrap_or(Bson::Null);
        if replacement.get("_id").is_some_and(|given| given != &id) {
            return Err(DocGraphError::query(
                "replacement would modify the immutable field '_id'",
            ));
        }
        let mut replaced = Document::new();
        replaced.insert("_id", id);
        for (key, value) in replacement {
            if key != "_id" {
                replaced.insert(key, value);
            }
        }
        if replaced == original {
            return Ok(UpdateOutcome {
                matched: 1,
                modified: 0,
            });
        }
        self.write_row(&conn, seq, &replaced)?;
        Ok(UpdateOutcome {
            matched: 1,
            modified: 1,
        })
    }

    fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError> {
        let conn = self.conn.lock();
        match self.load_matching(&conn, collection, filter)?.first() {
            Some((seq, _)) => {
                self.delete_row(&conn, *seq)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError> {
        let mut conn = self.conn.lock();
        if *filter == Filter::All {
            let removed = conn
                .execute(
                    "DELETE FROM doc_documents WHERE database=?1 AND collection=?2",
                    params![self.database, collection],
                )
                .map_err(|e| DocGraphError::query(e.to_string()))?;
            return Ok(removed as u64);
        }
        let tx = conn
            .transaction()
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        let matching = self.load_matching(&tx, collection, filter)?;
        for (seq, _) in &matching {
            self.delete_row(&tx, *seq)?;
        }
        tx.commit()
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        Ok(matching.len() as u64)
    }

    fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError> {
        let conn = self.conn.lock();
        if *filter == Filter::All {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM doc_documents WHERE database=?1 AND collection=?2",
                    params![self.database, collection],
                    |row| row.get(0),
                )
                .map_err(|e| DocGraphError::query(e.to_string()))?;
            return Ok(count as u64);
        }
        Ok(self.load_matching(&conn, collection, filter)?.len() as u64)
    }

    fn drop_database(&self, name: &str) -> Result<(), DocGraphError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        tx.execute("DELETE FROM doc_documents WHERE database=?1", params![name])
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        tx.execute("DELETE FROM doc_collections WHERE database=?1", params![name])
            .map_err(|e| DocGraphError::query(e.to_string()))?;
        tx.commit()
            .map_err(|e| DocGraphError::query(e.to_string()))
    }

    fn schema_version(&self) -> Result<Option<i64>, DocGraphError> {
        read_schema_version(&self.conn.lock()).map(Some)
    }

    fn close(&self) -> Result<(), DocGraphError> {
        let conn = self.conn.lock();
        let _ = conn.execute_batch("PRAGMA optimize");
        debug!(database = %self.database, "closed sqlite document store");
        Ok(())
    }
}
