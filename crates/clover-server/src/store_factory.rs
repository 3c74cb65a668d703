//! Store factory
//!
//! Builds the config, mapping and schema stores from a database URL.

use clover_core::{ConfigStore, Error, MappingStore, MemoryStore, Result, SchemaManager};
use clover_store_sqlite::SqliteStore;
use std::sync::Arc;

/// The three store roles, usually backed by one object
#[derive(Clone)]
pub struct Stores {
    pub config: Arc<dyn ConfigStore>,
    pub mappings: Arc<dyn MappingStore>,
    pub schema: Arc<dyn SchemaManager>,
}

impl Stores {
    fn from_backend<S>(store: S) -> Self
    where
        S: ConfigStore + MappingStore + SchemaManager + 'static,
    {
        let store = Arc::new(store);
        Self {
            config: store.clone(),
            mappings: store.clone(),
            schema: store,
        }
    }
}

/// Which backend a database URL selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory,
    SqliteMemory,
    Sqlite(String),
    Postgres(String),
}

impl Backend {
    pub fn parse(database_url: &str) -> Result<Self> {
        let url = database_url.trim();
        if url == "memory" {
            return Ok(Backend::Memory);
        }
        if url == "sqlite::memory:" || url == "sqlite://:memory:" {
            return Ok(Backend::SqliteMemory);
        }
        if let Some(path) = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
        {
            let path = shellexpand::tilde(path);
            return Ok(Backend::Sqlite(format!("sqlite://{}", path)));
        }
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(Backend::Postgres(url.to_string()));
        }
        Err(Error::Config(format!(
            "Unsupported database_url '{}' (expected memory, sqlite:// or postgres://)",
            database_url
        )))
    }

    /// Human readable description with credentials left out
    pub fn describe(&self) -> String {
        match self {
            Backend::Memory => "in-memory".to_string(),
            Backend::SqliteMemory => "SQLite (in-memory)".to_string(),
            Backend::Sqlite(url) => format!("SQLite ({})", url),
            Backend::Postgres(_) => "PostgreSQL".to_string(),
        }
    }
}

/// Create the stores for `database_url`
///
/// Relational stores are connected but not migrated; callers run
/// `SchemaManager::ensure_latest` themselves.
///
/// # Errors
/// - `Error::Config` for unsupported URLs or when the postgres feature is off
/// - `Error::Database` if the connection fails
pub async fn create_stores(database_url: &str) -> Result<Stores> {
    match Backend::parse(database_url)? {
        Backend::Memory => Ok(Stores::from_backend(MemoryStore::new())),
        Backend::SqliteMemory => Ok(Stores::from_backend(SqliteStore::in_memory().await?)),
        Backend::Sqlite(url) => Ok(Stores::from_backend(SqliteStore::new(&url).await?)),
        #[cfg(feature = "postgres")]
        Backend::Postgres(url) => Ok(Stores::from_backend(
            clover_store_postgres::PostgresStore::new(&url).await?,
        )),
        #[cfg(not(feature = "postgres"))]
        Backend::Postgres(_) => Err(Error::Config(
            "PostgreSQL support requires building with the 'postgres' feature".to_string(),
        )),
    }
}
