//! Interchange and channel types
//!
//! Two shapes exist for the same data:
//! - [`InterchangeConfig`] / [`ChannelConfig`] are what an administrator submits.
//!   Every field is a plain string so that malformed input still deserializes
//!   and can be reported field by field by [`crate::validation`].
//! - [`Interchange`] / [`Channel`] are validated, typed and what the stores
//!   persist and return.

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, InterchangeId};

/// A downstream endpoint that receives forwarded messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub url: String,
    /// Lower-cased trigger tokens, unique within the owning interchange
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Owning interchange; implied by nesting in the JSON shape
    #[serde(skip)]
    pub interchange_id: Option<InterchangeId>,
}

impl Channel {
    /// Whether this channel belongs to `interchange`
    pub fn belongs_to(&self, interchange: InterchangeId) -> bool {
        self.interchange_id == Some(interchange)
    }
}

/// A routing domain grouping channels.
///
/// `channels` is never empty once validated and `channels[0]` is always the
/// default channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interchange {
    pub id: InterchangeId,
    pub name: String,
    pub country: String,
    pub scheme: String,
    pub channels: Vec<Channel>,
}

impl Interchange {
    /// The channel used when neither a keyword nor a sticky mapping applies
    pub fn default_channel(&self) -> Option<&Channel> {
        self.channels.first()
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Order `channels` so that `default_channel_id` is first and the rest
    /// follow by id. Returns false if the pointer does not resolve.
    pub fn order_channels(channels: &mut Vec<Channel>, default_channel_id: ChannelId) -> bool {
        channels.sort_by_key(|c| c.id);
        match channels.iter().position(|c| c.id == default_channel_id) {
            Some(pos) => {
                let default = channels.remove(pos);
                channels.insert(0, default);
                true
            }
            None => false,
        }
    }
}

/// Interchange as submitted by an administrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchangeConfig {
    #[serde(default, alias = "uuid")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Channel as submitted by an administrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default, alias = "uuid")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl From<&Interchange> for InterchangeConfig {
    fn from(interchange: &Interchange) -> Self {
        Self {
            id: interchange.id.to_string(),
            name: interchange.name.clone(),
            country: interchange.country.clone(),
            scheme: interchange.scheme.clone(),
            channels: interchange
                .channels
                .iter()
                .map(|c| ChannelConfig {
                    id: c.id.to_string(),
                    name: c.name.clone(),
                    url: c.url.clone(),
                    keywords: c.keywords.clone(),
                })
                .collect(),
        }
    }
}

/// Parse a JSON array of submitted interchanges
pub fn parse_config(json: &str) -> crate::Result<Vec<InterchangeConfig>> {
    Ok(serde_json::from_str(json)?)
}
