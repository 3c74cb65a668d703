//! Relay of an inbound message to its channel
//!
//! The outbound request mirrors the inbound one: same method, the channel URL
//! with the inbound query appended, the inbound form values re-encoded as the
//! body and the inbound headers minus hop-by-hop ones. The downstream status
//! and body come back untouched.

use bytes::Bytes;
use clover_core::Channel;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use crate::client::{ForwarderConfig, create_client};
use crate::{EgressError, Result};

/// The parts of an inbound request that are relayed downstream
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    /// Raw query string, without the leading `?`
    pub query: Option<String>,
    /// Form values from the request body, in received order
    pub form: Vec<(String, String)>,
}

/// A downstream response relayed back to the caller
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Forwards inbound requests to channel URLs through a pooled client
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(config: &ForwarderConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
            timeout: config.request_timeout(),
        })
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `inbound` to `channel` and return the downstream response
    ///
    /// The whole exchange runs under the request deadline; on expiry the
    /// outbound request is dropped and `EgressError::Timeout` is returned.
    pub async fn forward(
        &self,
        channel: &Channel,
        inbound: &InboundRequest,
    ) -> Result<ForwardedResponse> {
        let url = outbound_url(&channel.url, inbound.query.as_deref())?;

        let mut builder = self.client.request(inbound.method.clone(), url.clone());
        let with_body = carries_body(&inbound.method);

        for (name, value) in inbound.headers.iter() {
            if is_hop_by_hop_header(name.as_str())
                || *name == HOST
                || *name == CONTENT_LENGTH
                || (with_body && *name == CONTENT_TYPE)
            {
                continue;
            }
            builder = builder.header(name.clone(), value.clone());
        }

        if with_body {
            let body = serde_urlencoded::to_string(&inbound.form)?;
            builder = builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body);
        }

        debug!(
            channel_id = %channel.id,
            "Forwarding {} to {}",
            inbound.method, url
        );

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let content_type = response.headers().get(CONTENT_TYPE).cloned();
            let body = response.bytes().await?;
            Ok::<_, EgressError>(ForwardedResponse {
                status,
                content_type,
                body,
            })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(response)) => {
                debug!(
                    channel_id = %channel.id,
                    url = %url,
                    status = response.status.as_u16(),
                    "Downstream responded ({} bytes)",
                    response.body.len()
                );
                Ok(response)
            }
            Ok(Err(e)) => {
                error!(
                    channel_id = %channel.id,
                    url = %url,
                    "Error forwarding message: {}",
                    e
                );
                Err(e)
            }
            Err(_) => {
                error!(
                    channel_id = %channel.id,
                    url = %url,
                    "Forwarding timed out after {:?}",
                    self.timeout
                );
                Err(EgressError::Timeout(self.timeout))
            }
        }
    }
}

/// Channel URL with the inbound query string appended
///
/// The raw query is appended as received: key order, duplicate keys, `+` and
/// existing `%XX` escapes are untouched. URL parsing percent-encodes the few
/// bytes that are not valid in a special-scheme query (`'`, space, `"`, `<`,
/// `>`), so a `'` reaches the channel as `%27`. Form decoders treat both
/// spellings alike.
pub fn outbound_url(channel_url: &str, query: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(channel_url).map_err(|e| EgressError::InvalidUrl {
        url: channel_url.to_string(),
        reason: e.to_string(),
    })?;

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        let joined = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, query),
            _ => query.to_string(),
        };
        url.set_query(Some(&joined));
    }

    Ok(url)
}

/// Methods whose outbound request carries the encoded form
fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Check if a header is a hop-by-hop header that shouldn't be forwarded
fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}
