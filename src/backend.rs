//! Document store backends.
//!
//! [`DocumentStore`] is the whole surface the repositories need from a document
//! database: collection-scoped insert/find/update/delete, collection listing and
//! database dropping. [`SqliteStore`] keeps documents as BSON blobs in SQLite and
//! evaluates requests in-process; `MongoStore` (feature `mongodb`) forwards them to a
//! MongoDB server.

pub mod eval;
#[cfg(feature = "mongodb")]
mod mongo;
mod sqlite;
pub mod types;

#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;
pub use sqlite::SqliteStore;
pub use types::{Filter, FindOptions, SortDirection, Update, UpdateOutcome};

use bson::{Bson, Document};

use crate::{config::BackendKind, errors::DocGraphError};

/// Backend trait for document databases.
///
/// Every method is a single blocking request. Implementations assign an ObjectId
/// `_id` to inserted documents that lack one.
pub trait DocumentStore: Send + Sync {
    fn kind(&self) -> BackendKind;
    /// Name of the database this handle is bound to.
    fn database_name(&self) -> &str;
    fn list_collection_names(&self) -> Result<Vec<String>, DocGraphError>;
    fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, DocGraphError>;
    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, DocGraphError>;
    fn find_one(&self, collection: &str, filter: &Filter)
    -> Result<Option<Document>, DocGraphError>;
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DocGraphError>;
    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, DocGraphError>;
    /// Replaces the first match wholesale, keeping its `_id`.
    fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        replacement: Document,
    ) -> Result<UpdateOutcome, DocGraphError>;
    fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError>;
    fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError>;
    fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError>;
    /// Irreversibly removes the named database and all of its collections.
    fn drop_database(&self, name: &str) -> Result<(), DocGraphError>;
    /// On-disk layout version, for backends that manage their own schema.
    fn schema_version(&self) -> Result<Option<i64>, DocGraphError> {
        Ok(None)
    }
    /// Releases server-side resources. Dropping the store must have the same effect.
    fn close(&self) -> Result<(), DocGraphError> {
        Ok(())
    }
}

impl<B> DocumentStore for Box<B>
where
    B: DocumentStore + ?Sized,
{
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn database_name(&self) -> &str {
        (**self).database_name()
    }

    fn list_collection_names(&self) -> Result<Vec<String>, DocGraphError> {
        (**self).list_collection_names()
    }

    fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, DocGraphError> {
        (**self).insert_one(collection, document)
    }

    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, DocGraphError> {
        (**self).insert_many(collection, documents)
    }

    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DocGraphError> {
        (**self).find_one(collection, filter)
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DocGraphError> {
        (**self).find(collection, filter, options)
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, DocGraphError> {
        (**self).update_one(collection, filter, update)
    }

    fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        replacement: Document,
    ) -> Result<UpdateOutcome, DocGraphError> {
        (**self).replace_one(collection, filter, replacement)
    }

    fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError> {
        (**self).delete_one(collection, filter)
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError> {
        (**self).delete_many(collection, filter)
    }

    fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError> {
        (**self).count_documents(collection, filter)
    }

    fn drop_database(&self, name: &str) -> Result<(), DocGraphError> {
        (**self).drop_database(name)
    }

    fn schema_version(&self) -> Result<Option<i64>, DocGraphError> {
        (**self).schema_version()
    }

    fn close(&self) -> Result<(), DocGraphError> {
        (**self).close()
    }
}
