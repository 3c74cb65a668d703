//! Forward-only schema management

use async_trait::async_trait;

use crate::Result;

/// A single forward-only migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique version number (must be sequential)
    pub version: i64,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to execute for this migration
    pub up_sql: &'static str,
}

/// Highest version in an ordered migration list
pub fn latest_version(migrations: &[Migration]) -> i64 {
    migrations.last().map(|m| m.version).unwrap_or(0)
}

/// Store-level view of the schema migration runner
#[async_trait]
pub trait SchemaManager: Send + Sync {
    /// Apply every missing migration in order, returning the resulting version
    async fn ensure_latest(&self) -> Result<i64>;

    /// Highest applied version, `None` for an uninitialised database
    async fn current_version(&self) -> Result<Option<i64>>;
}
