//! Connection provider.
//!
//! A [`Connection`] owns one store handle and is passed explicitly into every
//! repository and engine. Closing is explicit through [`Connection::close`]; a
//! connection that is simply dropped is closed by its `Drop` impl, so release happens
//! on every exit path.

use bson::{Bson, Document};
use tracing::{debug, warn};

use crate::{
    backend::{DocumentStore, Filter, FindOptions, SqliteStore, Update, UpdateOutcome},
    config::{BackendKind, StoreConfig},
    errors::DocGraphError,
};

pub struct Connection {
    store: Box<dyn DocumentStore>,
    closed: bool,
}

impl Connection {
    /// Opens the backend selected by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, DocGraphError> {
        let store: Box<dyn DocumentStore> = match config.backend {
            BackendKind::Sqlite => match &config.sqlite.path {
                Some(path) => Box::new(SqliteStore::open(path, &config.database)?),
                None => Box::new(SqliteStore::open_in_memory(&config.database)?),
            },
            #[cfg(feature = "mongodb")]
            BackendKind::Mongo => Box::new(crate::backend::MongoStore::connect(
                &config.mongo,
                &config.database,
            )?),
            #[cfg(not(feature = "mongodb"))]
            BackendKind::Mongo => {
                return Err(DocGraphError::connection(
                    "docgraph was built without the `mongodb` feature",
                ));
            }
        };
        debug!(backend = %config.backend, database = %config.database, "connection opened");
        Ok(Self::from_boxed(store))
    }

    /// In-memory SQLite connection bound to `database`.
    pub fn in_memory(database: &str) -> Result<Self, DocGraphError> {
        Ok(Self::from_store(SqliteStore::open_in_memory(database)?))
    }

    pub fn from_store<S: DocumentStore + 'static>(store: S) -> Self {
        Self::from_boxed(Box::new(store))
    }

    fn from_boxed(store: Box<dyn DocumentStore>) -> Self {
        Self {
            store,
            closed: false,
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn backend(&self) -> BackendKind {
        self.store.kind()
    }

    pub fn database_name(&self) -> &str {
        self.store.database_name()
    }

    pub fn collection(&self, name: &str) -> Collection<'_> {
        Collection {
            store: self.store.as_ref(),
            name: name.to_string(),
        }
    }

    pub fn list_collection_names(&self) -> Result<Vec<String>, DocGraphError> {
        self.store.list_collection_names()
    }

    pub fn drop_database(&self, name: &str) -> Result<(), DocGraphError> {
        self.store.drop_database(name)
    }

    /// Stored schema version; `None` for backends without a managed schema.
    pub fn schema_version(&self) -> Result<Option<i64>, DocGraphError> {
        self.store.schema_version()
    }

    pub fn close(mut self) -> Result<(), DocGraphError> {
        self.closed = true;
        self.store.close()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.store.close() {
            warn!(%err, "error closing connection");
        }
    }
}

/// Handle on one named collection of a [`Connection`].
pub struct Collection<'a> {
    store: &'a dyn DocumentStore,
    name: String,
}

impl Collection<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert_one(&self, document: Document) -> Result<Bson, DocGraphError> {
        self.store.insert_one(&self.name, document)
    }

    pub fn insert_many(&self, documents: Vec<Document>) -> Result<usize, DocGraphError> {
        self.store.insert_many(&self.name, documents)
    }

    pub fn find_one(&self, filter: &Filter) -> Result<Option<Document>, DocGraphError> {
        self.store.find_one(&self.name, filter)
    }

    pub fn find(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DocGraphError> {
        self.store.find(&self.name, filter, options)
    }

    pub fn update_one(
        &self,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, DocGraphError> {
        self.store.update_one(&self.name, filter, update)
    }

    pub fn replace_one(
        &self,
        filter: &Filter,
        replacement: Document,
    ) -> Result<UpdateOutcome, DocGraphError> {
        self.store.replace_one(&self.name, filter, replacement)
    }

    pub fn delete_one(&self, filter: &Filter) -> Result<u64, DocGraphError> {
        self.store.delete_one(&self.name, filter)
    }

    pub fn delete_many(&self, filter: &Filter) -> Result<u64, DocGraphError> {
        self.store.delete_many(&self.name, filter)
    }

    pub fn count_documents(&self, filter: &Filter) -> Result<u64, DocGraphError> {
        self.store.count_documents(&self.name, filter)
    }
}
