//! Clover Egress
//!
//! Relays routed messages to downstream channels:
//! - Pooled HTTP client construction
//! - Forwarder with a per-request deadline

pub mod client;
pub mod error;
pub mod forwarder;

pub use client::{ForwarderConfig, create_client};
pub use error::{EgressError, Result};
pub use forwarder::{ForwardedResponse, Forwarder, InboundRequest};
