//! Routing decisions
//!
//! Resolves the channel for an inbound message with a fixed priority:
//! 1. A keyword matching the trimmed message (also makes the sender sticky)
//! 2. The sender's existing mapping within the interchange
//! 3. The interchange's default channel

use clover_core::{Channel, Error, Interchange, InterchangeId, MappingStore, Result, Urn};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::RoutingCache;

/// Why a channel was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingReason {
    /// The message matched this keyword
    Keyword(String),
    /// The sender had a sticky mapping
    UrnMapping,
    /// Nothing else applied
    DefaultChannel,
}

impl fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingReason::Keyword(keyword) => write!(f, "keyword '{}'", keyword),
            RoutingReason::UrnMapping => write!(f, "urn mapping"),
            RoutingReason::DefaultChannel => write!(f, "default channel"),
        }
    }
}

/// Outcome of [`RoutingEngine::decide`]
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub channel: Channel,
    pub urn: Urn,
    pub reason: RoutingReason,
}

/// First channel (in stored order) owning a keyword equal to `message`
///
/// `message` is trimmed and lower-cased before comparison; keywords are
/// stored lower-cased.
pub fn match_keyword<'a>(
    interchange: &'a Interchange,
    message: &str,
) -> Option<(&'a Channel, &'a str)> {
    let needle = message.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    interchange.channels.iter().find_map(|channel| {
        channel
            .keywords
            .iter()
            .find(|keyword| **keyword == needle)
            .map(|keyword| (channel, keyword.as_str()))
    })
}

/// Routing engine over the routing cache and the mapping store
#[derive(Clone)]
pub struct RoutingEngine {
    cache: Arc<RoutingCache>,
    mappings: Arc<dyn MappingStore>,
}

impl RoutingEngine {
    pub fn new(cache: Arc<RoutingCache>, mappings: Arc<dyn MappingStore>) -> Self {
        Self { cache, mappings }
    }

    pub fn cache(&self) -> &Arc<RoutingCache> {
        &self.cache
    }

    pub fn mappings(&self) -> &Arc<dyn MappingStore> {
        &self.mappings
    }

    /// Resolve an interchange through the cache
    ///
    /// # Errors
    /// - `Error::InterchangeNotFound` if no such interchange is configured
    pub async fn interchange(&self, id: InterchangeId) -> Result<Arc<Interchange>> {
        self.cache
            .get(id)
            .await?
            .ok_or_else(|| Error::InterchangeNotFound(id.to_string()))
    }

    /// Pick the channel for a message from `sender`
    ///
    /// Performs one mapping write on a keyword match and none otherwise.
    pub async fn decide(
        &self,
        interchange: &Interchange,
        sender: &str,
        message: &str,
    ) -> Result<RoutingDecision> {
        let urn = Urn::new(&interchange.scheme, sender);

        let (channel, reason) = if let Some((channel, keyword)) =
            match_keyword(interchange, message)
        {
            self.mappings.set_mapping(interchange, channel, &urn).await?;
            debug!(
                interchange_id = %interchange.id,
                channel_id = %channel.id,
                urn = %urn,
                "Sender mapped by keyword"
            );
            (channel.clone(), RoutingReason::Keyword(keyword.to_string()))
        } else if let Some(mapped) = self.mappings.get_mapping(interchange, &urn).await? {
            (mapped, RoutingReason::UrnMapping)
        } else {
            let default = interchange.default_channel().ok_or_else(|| {
                Error::Integrity(format!("interchange {} has no channels", interchange.id))
            })?;
            (default.clone(), RoutingReason::DefaultChannel)
        };

        info!(
            interchange_id = %interchange.id,
            channel_id = %channel.id,
            url = %channel.url,
            urn = %urn,
            message = %message,
            reason = %reason,
            "Routing message"
        );

        Ok(RoutingDecision {
            channel,
            urn,
            reason,
        })
    }
}
