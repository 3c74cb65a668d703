//! Clover HTTP Ingress
//!
//! This crate provides the HTTP surface of the gateway:
//! - `/i/{id}/receive` inbound message endpoint
//! - `/admin` configuration and `/admin/{id}/map` mapping endpoints
//! - Basic-auth gate for the admin routes
//! - Response envelopes and error to status mapping

pub mod admin;
pub mod auth;
pub mod form;
pub mod receive;
pub mod server;
pub mod types;

pub use auth::AdminCredentials;
pub use server::{AppState, build_router};
pub use types::{AdminView, ApiError, DataResponse, ErrorResponse};
