use thiserror::Error;

/// Error type for docgraph operations.
///
/// Absence of a single document is never an error; lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum DocGraphError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("type error: {0}")]
    TypeError(String),
    #[error("invalid identifier: {0}")]
    InvalidId(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("snapshot file not found: {0}")]
    SnapshotNotFound(String),
}

impl DocGraphError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        DocGraphError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        DocGraphError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        DocGraphError::QueryError(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        DocGraphError::ValidationError(msg.into())
    }

    pub fn type_error<T: Into<String>>(msg: T) -> Self {
        DocGraphError::TypeError(msg.into())
    }

    pub fn invalid_id<T: Into<String>>(msg: T) -> Self {
        DocGraphError::InvalidId(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        DocGraphError::InvalidInput(msg.into())
    }

    pub fn io<T: Into<String>>(msg: T) -> Self {
        DocGraphError::Io(msg.into())
    }

    pub fn snapshot_not_found<T: Into<String>>(msg: T) -> Self {
        DocGraphError::SnapshotNotFound(msg.into())
    }
}
