//! Clover Routing Engine
//!
//! This crate provides the routing logic for Clover:
//! - Read-through routing cache with TTL and wholesale invalidation
//! - Keyword, sticky mapping and default channel resolution

pub mod cache;
pub mod engine;

// Re-export commonly used types
pub use cache::{DEFAULT_TTL, RoutingCache};
pub use engine::{RoutingDecision, RoutingEngine, RoutingReason, match_keyword};
