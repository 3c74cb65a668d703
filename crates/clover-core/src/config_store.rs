//! Configuration store trait
//!
//! The `ConfigStore` trait abstracts durable storage of interchanges and their
//! channels, allowing the same routing logic to run over SQLite, PostgreSQL or
//! the in-memory store.

use async_trait::async_trait;

use crate::{
    Result,
    ids::InterchangeId,
    model::{Interchange, InterchangeConfig},
    validation::validate_config,
};

/// Configuration store trait
///
/// Interchanges and channels are never mutated individually: the whole
/// configuration is declared at once and the store converges on it.
///
/// Implementations:
/// - `SqliteStore`: single-node relational storage
/// - `PostgresStore`: production relational storage
/// - `MemoryStore`: in-process snapshot-and-swap storage
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Atomically make `interchanges` the entire stored configuration
    ///
    /// For each interchange `channels[0]` becomes the persisted default channel.
    /// Everything submitted is upserted by id, everything stored but absent is
    /// deleted (cascading to mappings), and mappings whose channel moved to a
    /// different interchange are removed. Either all of it commits or none.
    ///
    /// Callers must pass configuration produced by [`validate_config`].
    ///
    /// # Errors
    /// - `Error::Database` if the transaction fails; the previous
    ///   configuration is left intact
    async fn apply_config(&self, interchanges: &[Interchange]) -> Result<()>;

    /// Get one interchange with its default channel first
    ///
    /// Returns `Ok(None)` for unknown ids.
    ///
    /// # Errors
    /// - `Error::Integrity` if the stored default pointer does not resolve to
    ///   one of the interchange's channels
    async fn get(&self, id: InterchangeId) -> Result<Option<Interchange>>;

    /// Get every interchange ordered by id, each with its default channel first
    async fn get_all(&self) -> Result<Vec<Interchange>>;

    /// Validate then atomically persist a submitted configuration
    ///
    /// # Errors
    /// - `Error::Validation` with every field-level failure; nothing is written
    async fn replace_all(&self, submitted: &[InterchangeConfig]) -> Result<Vec<Interchange>> {
        let validated = validate_config(submitted)?;
        self.apply_config(&validated).await?;
        Ok(validated)
    }
}
