//! MongoDB backend using the driver's blocking API.

use bson::{Bson, Document, doc};
use mongodb::{
    error::ErrorKind,
    options::ClientOptions,
    sync::{Client, Collection, Database},
};
use tracing::{debug, error};

use crate::{
    backend::{
        DocumentStore,
        types::{Filter, FindOptions, Update, UpdateOutcome},
    },
    config::{BackendKind, MongoConfig},
    errors::DocGraphError,
};

pub struct MongoStore {
    client: Client,
    database: Database,
    name: String,
}

/// Server selection and socket failures mean the deployment is unreachable; every
/// other driver error is a failed request.
fn query_error(err: mongodb::error::Error) -> DocGraphError {
    match *err.kind {
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
            DocGraphError::connection(err.to_string())
        }
        _ => DocGraphError::query(err.to_string()),
    }
}

impl MongoStore {
    /// Connects and pings the server so an unreachable deployment fails here rather
    /// than on the first request.
    pub fn connect(config: &MongoConfig, database: &str) -> Result<Self, DocGraphError> {
        let mut options = ClientOptions::parse(config.connection_string.as_str())
            .run()
            .map_err(|e| DocGraphError::connection(e.to_string()))?;
        options.server_selection_timeout = Some(config.server_selection_timeout);
        let client =
            Client::with_options(options).map_err(|e| DocGraphError::connection(e.to_string()))?;
        if let Err(err) = client.database("admin").run_command(doc! { "ping": 1 }).run() {
            error!(%err, "failed to connect to MongoDB");
            return Err(DocGraphError::connection(format!(
                "could not connect to MongoDB: {err}"
            )));
        }
        debug!(database, "connected to MongoDB");
        Ok(Self {
            database: client.database(database),
            client,
            name: database.to_string(),
        })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

impl DocumentStore for MongoStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Mongo
    }

    fn database_name(&self) -> &str {
        &self.name
    }

    fn list_collection_names(&self) -> Result<Vec<String>, DocGraphError> {
        self.database.list_collection_names().run().map_err(query_error)
    }

    fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, DocGraphError> {
        let result = self
            .collection(collection)
            .insert_one(document)
            .run()
            .map_err(query_error)?;
        Ok(result.inserted_id)
    }

    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, DocGraphError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection(collection)
            .insert_many(documents)
            .run()
            .map_err(query_error)?;
        Ok(result.inserted_ids.len())
    }

    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DocGraphError> {
        self.collection(collection)
            .find_one(filter.to_document())
            .run()
            .map_err(query_error)
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DocGraphError> {
        let coll = self.collection(collection);
        let mut action = coll.find(filter.to_document());
        if let Some((field, direction)) = &options.sort {
            let mut sort = Document::new();
            sort.insert(field.clone(), direction.as_flag());
            action = action.sort(sort);
        }
        if let Some(limit) = options.limit {
            action = action.limit(limit);
        }
        let cursor = action.run().map_err(query_error)?;
        cursor
            .map(|document| document.map_err(query_error))
            .collect()
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, DocGraphError> {
        let result = self
            .collection(collection)
            .update_one(filter.to_document(), update.to_document())
            .run()
            .map_err(query_error)?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        replacement: Document,
    ) -> Result<UpdateOutcome, DocGraphError> {
        let result = self
            .collection(collection)
            .replace_one(filter.to_document(), replacement)
            .run()
            .map_err(query_error)?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError> {
        let result = self
            .collection(collection)
            .delete_one(filter.to_document())
            .run()
            .map_err(query_error)?;
        Ok(result.deleted_count)
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError> {
        let result = self
            .collection(collection)
            .delete_many(filter.to_document())
            .run()
            .map_err(query_error)?;
        Ok(result.deleted_count)
    }

    fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64, DocGraphError> {
        self.collection(collection)
            .count_documents(filter.to_document())
            .run()
            .map_err(query_error)
    }

    fn drop_database(&self, name: &str) -> Result<(), DocGraphError> {
        self.client.database(name).drop().run().map_err(query_error)
    }

    fn close(&self) -> Result<(), DocGraphError> {
        debug!(database = %self.name, "closing MongoDB client");
        Ok(())
    }
}
