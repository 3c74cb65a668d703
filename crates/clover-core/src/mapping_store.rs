//! Sticky sender → channel mappings

use async_trait::async_trait;

use crate::{
    Error, Result,
    ids::InterchangeId,
    ids::Urn,
    model::{Channel, Interchange},
};

/// Mapping store trait
///
/// Each mapping is keyed by `(interchange, urn)`; writes are single atomic
/// upserts or deletes relying on that uniqueness, last write wins.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Insert or overwrite the mapping for `(interchange, urn)`
    ///
    /// `interchange` and `channel` may be stale snapshots. Implementations
    /// check ownership against the stored channel in the same write and
    /// return `Error::OwnershipMismatch` when it belongs elsewhere. Calling
    /// code goes through [`MappingStore::set_mapping`].
    async fn upsert_mapping(&self, interchange: &Interchange, channel: &Channel, urn: &Urn)
    -> Result<()>;

    /// Remove the mapping for `(interchange, urn)`; absence is not an error
    async fn clear_mapping(&self, interchange: InterchangeId, urn: &Urn) -> Result<()>;

    /// The channel currently mapped for `(interchange, urn)`, if any
    ///
    /// A mapping whose channel is no longer owned by `interchange` reads as
    /// absent.
    async fn get_mapping(&self, interchange: &Interchange, urn: &Urn) -> Result<Option<Channel>>;

    /// Associate `urn` with `channel` within `interchange`
    ///
    /// # Errors
    /// - `Error::OwnershipMismatch` if `channel` is not owned by `interchange`
    async fn set_mapping(&self, interchange: &Interchange, channel: &Channel, urn: &Urn) -> Result<()> {
        if !channel.belongs_to(interchange.id) {
            return Err(Error::OwnershipMismatch {
                channel: channel.id,
                interchange: interchange.id,
            });
        }
        self.upsert_mapping(interchange, channel, urn).await
    }
}
