//! End-to-end integration tests for Clover
//!
//! The tests under `tests/` drive the full HTTP router against a SQLite
//! in-memory store, with wiremock servers standing in for channel endpoints.
