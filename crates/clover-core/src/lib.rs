//! Clover Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout Clover:
//! - Interchange, channel and URN types
//! - Explicit configuration validation
//! - Config, mapping and schema store trait abstractions
//! - Core error types

pub mod config_store;
pub mod error;
pub mod ids;
pub mod mapping_store;
pub mod memory_store;
pub mod model;
pub mod schema;
pub mod validation;

pub use config_store::ConfigStore;
pub use error::{Error, FieldError, Result, ValidationErrors};
pub use ids::{ChannelId, InterchangeId, Urn};
pub use mapping_store::MappingStore;
pub use memory_store::MemoryStore;
pub use model::{Channel, ChannelConfig, Interchange, InterchangeConfig};
pub use schema::{Migration, SchemaManager};
