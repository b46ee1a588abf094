//! Configuration for backend selection and backend-specific options.
//!
//! [`StoreConfig`] picks a [`BackendKind`] and carries the options of both backends;
//! [`crate::Connection::open`] turns it into a live handle.
//!
//! # Examples
//!
//! ```rust
//! use docgraph::{BackendKind, StoreConfig};
//!
//! let cfg = StoreConfig::sqlite().with_database("campaign");
//! assert_eq!(cfg.backend, BackendKind::Sqlite);
//! assert!(cfg.sqlite.path.is_none());
//!
//! let cfg = StoreConfig::mongo();
//! assert_eq!(cfg.mongo.connection_string, "mongodb://localhost:27017/");
//! ```

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use crate::errors::DocGraphError;

pub const DEFAULT_DATABASE: &str = "test_db";
pub const DEFAULT_CONNECTION_STRING: &str = "mongodb://localhost:27017/";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
/// Database file the command line tool uses when no path is given.
pub const DEFAULT_SQLITE_PATH: &str = "docgraph.sqlite";

/// Backend selection enum for choosing between storage implementations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded document store in a SQLite file (or in memory).
    #[default]
    Sqlite,
    /// External MongoDB deployment.
    Mongo,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Mongo => "mongo",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = DocGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "mongo" | "mongodb" => Ok(BackendKind::Mongo),
            other => Err(DocGraphError::invalid_input(format!(
                "unsupported backend {other}"
            ))),
        }
    }
}

/// Options for the embedded SQLite store.
#[derive(Clone, Debug, Default)]
pub struct SqliteConfig {
    /// Database file; `None` keeps everything in memory.
    pub path: Option<PathBuf>,
}

/// Options for the MongoDB backend.
#[derive(Clone, Debug)]
pub struct MongoConfig {
    pub connection_string: String,
    /// Upper bound for the connect-time ping and for every server selection.
    pub server_selection_timeout: Duration,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_CONNECTION_STRING.to_string(),
            server_selection_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Unified configuration for both backends.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub database: String,
    pub sqlite: SqliteConfig,
    pub mongo: MongoConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            database: DEFAULT_DATABASE.to_string(),
            sqlite: SqliteConfig::default(),
            mongo: MongoConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    pub fn sqlite() -> Self {
        Self::new(BackendKind::Sqlite)
    }

    pub fn mongo() -> Self {
        Self::new(BackendKind::Mongo)
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqlite.path = Some(path.into());
        self
    }

    pub fn with_connection_string(mut self, uri: impl Into<String>) -> Self {
        self.mongo.connection_string = uri.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.mongo.server_selection_timeout = timeout;
        self
    }
}
