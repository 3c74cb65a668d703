//! SQLite storage backend for Clover
//!
//! Persists interchanges, channels and sticky URN mappings in a single SQLite
//! database. Used for single-node deployments and as the default test backend.

pub mod migrations;
pub mod sqlite_store;

pub use sqlite_store::SqliteStore;
