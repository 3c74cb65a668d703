//! PostgreSQL storage backend for Clover
//!
//! Multi-node deployments point every gateway at the same database; the
//! routing cache on each node converges within its TTL after a replace.

pub mod migrations;
pub mod postgres_store;

pub use postgres_store::PostgresStore;
