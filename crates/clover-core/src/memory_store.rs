//! In-process store used for ephemeral deployments and tests
//!
//! Implements the same semantics as the relational stores with a
//! snapshot-and-swap: a replace builds a complete new snapshot off to the side
//! and swaps it in under the write lock, so readers only ever observe the old
//! or the new configuration.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::{
    Error, Result,
    config_store::ConfigStore,
    ids::{ChannelId, InterchangeId, Urn},
    mapping_store::MappingStore,
    model::{Channel, Interchange},
    schema::SchemaManager,
};

#[derive(Debug, Clone)]
struct StoredInterchange {
    name: String,
    country: String,
    scheme: String,
    default_channel_id: ChannelId,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    interchanges: BTreeMap<InterchangeId, StoredInterchange>,
    channels: HashMap<ChannelId, Channel>,
    mappings: HashMap<(InterchangeId, Urn), ChannelId>,
}

impl Snapshot {
    fn load(&self, id: InterchangeId) -> Result<Option<Interchange>> {
        let Some(stored) = self.interchanges.get(&id) else {
            return Ok(None);
        };

        let mut channels: Vec<Channel> = self
            .channels
            .values()
            .filter(|c| c.belongs_to(id))
            .cloned()
            .collect();

        if !Interchange::order_channels(&mut channels, stored.default_channel_id) {
            error!(
                interchange_id = %id,
                default_channel_id = %stored.default_channel_id,
                "Default channel does not resolve for interchange"
            );
            return Err(Error::Integrity(format!(
                "unable to find default channel: {} for interchange: {}",
                stored.default_channel_id, id
            )));
        }

        Ok(Some(Interchange {
            id,
            name: stored.name.clone(),
            country: stored.country.clone(),
            scheme: stored.scheme.clone(),
            channels,
        }))
    }
}

/// In-memory `ConfigStore` + `MappingStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored mappings
    pub async fn mapping_count(&self) -> usize {
        self.state.read().await.mappings.len()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn apply_config(&self, interchanges: &[Interchange]) -> Result<()> {
        let mut state = self.state.write().await;

        let mut next = Snapshot::default();
        for interchange in interchanges {
            let default = interchange.default_channel().ok_or_else(|| {
                Error::Integrity(format!("interchange {} has no channels", interchange.id))
            })?;

            next.interchanges.insert(
                interchange.id,
                StoredInterchange {
                    name: interchange.name.clone(),
                    country: interchange.country.clone(),
                    scheme: interchange.scheme.clone(),
                    default_channel_id: default.id,
                },
            );
            for channel in &interchange.channels {
                let mut channel = channel.clone();
                channel.interchange_id = Some(interchange.id);
                next.channels.insert(channel.id, channel);
            }
        }

        // mappings survive only while their channel still belongs to their interchange
        next.mappings = state
            .mappings
            .iter()
            .filter(|((interchange_id, _), channel_id)| {
                next.channels
                    .get(*channel_id)
                    .is_some_and(|c| c.belongs_to(*interchange_id))
            })
            .map(|(key, channel_id)| (key.clone(), *channel_id))
            .collect();

        debug!(
            "Swapping in configuration: {} interchanges, {} channels, {} mappings kept",
            next.interchanges.len(),
            next.channels.len(),
            next.mappings.len()
        );

        *state = next;
        Ok(())
    }

    async fn get(&self, id: InterchangeId) -> Result<Option<Interchange>> {
        self.state.read().await.load(id)
    }

    async fn get_all(&self) -> Result<Vec<Interchange>> {
        let state = self.state.read().await;
        let mut all = Vec::with_capacity(state.interchanges.len());
        for id in state.interchanges.keys() {
            if let Some(interchange) = state.load(*id)? {
                all.push(interchange);
            }
        }
        Ok(all)
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn upsert_mapping(
        &self,
        interchange: &Interchange,
        channel: &Channel,
        urn: &Urn,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        if !state.interchanges.contains_key(&interchange.id) {
            return Err(Error::InterchangeNotFound(interchange.id.to_string()));
        }
        // ownership is checked against the stored channel, not the caller's copy
        match state.channels.get(&channel.id) {
            None => return Err(Error::ChannelNotFound(channel.id.to_string())),
            Some(stored) if !stored.belongs_to(interchange.id) => {
                return Err(Error::OwnershipMismatch {
                    channel: channel.id,
                    interchange: interchange.id,
                });
            }
            Some(_) => {}
        }

        state
            .mappings
            .insert((interchange.id, urn.clone()), channel.id);
        Ok(())
    }

    async fn clear_mapping(&self, interchange: InterchangeId, urn: &Urn) -> Result<()> {
        self.state
            .write()
            .await
            .mappings
            .remove(&(interchange, urn.clone()));
        Ok(())
    }

    async fn get_mapping(&self, interchange: &Interchange, urn: &Urn) -> Result<Option<Channel>> {
        let state = self.state.read().await;
        Ok(state
            .mappings
            .get(&(interchange.id, urn.clone()))
            .and_then(|channel_id| state.channels.get(channel_id))
            .filter(|channel| channel.belongs_to(interchange.id))
            .cloned())
    }
}

#[async_trait]
impl SchemaManager for MemoryStore {
    async fn ensure_latest(&self) -> Result<i64> {
        Ok(0)
    }

    async fn current_version(&self) -> Result<Option<i64>> {
        Ok(Some(0))
    }
}
