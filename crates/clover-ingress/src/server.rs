//! Router assembly and the small service endpoints

use axum::{
    Json, Router,
    http::{Method, Uri},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use clover_egress::Forwarder;
use clover_routing::RoutingEngine;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{AdminCredentials, require_basic_auth};
use crate::types::ApiError;
use crate::{admin, receive};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RoutingEngine>,
    pub forwarder: Arc<Forwarder>,
    /// When set, admin routes require these credentials
    pub admin: Option<AdminCredentials>,
}

impl AppState {
    pub fn new(engine: Arc<RoutingEngine>, forwarder: Arc<Forwarder>) -> Self {
        Self {
            engine,
            forwarder,
            admin: None,
        }
    }

    pub fn with_admin(mut self, credentials: AdminCredentials) -> Self {
        self.admin = Some(credentials);
        self
    }
}

/// Build the complete HTTP router
pub fn build_router(state: AppState) -> Router {
    let mut admin_routes = Router::new()
        .route("/admin", get(admin::view_config).post(admin::update_config))
        .route(
            "/admin/{id}/map",
            post(admin::set_mapping).delete(admin::clear_mapping),
        );

    if let Some(credentials) = state.admin.clone() {
        admin_routes = admin_routes.route_layer(middleware::from_fn_with_state(
            Arc::new(credentials),
            require_basic_auth,
        ));
    }

    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route(
            "/i/{id}/receive",
            get(receive::receive).post(receive::receive),
        )
        .merge(admin_routes)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    format!(
        "clover {}\nmessage routing gateway\n",
        env!("CARGO_PKG_VERSION")
    )
}

async fn healthz() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::RouteNotFound(uri.path().to_string())
}

async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::MethodNotAllowed(format!("{} {}", method, uri.path()))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use axum::body::Body;
    use axum::response::Response;
    use clover_core::{ChannelConfig, ConfigStore, InterchangeConfig, MemoryStore};
    use clover_egress::ForwarderConfig;
    use clover_routing::RoutingCache;
    use http_body_util::BodyExt;

    pub const INTERCHANGE: &str = "5fb66333-7f8c-47aa-9aa5-bfee37b79b22";
    pub const CHANNEL_ONE: &str = "557d3353-6b89-441a-aee5-8c398fd7a61f";
    pub const CHANNEL_TWO: &str = "3d0cd397-2228-4185-86db-7e3272fc423e";

    pub fn config(url_one: &str, url_two: &str) -> Vec<InterchangeConfig> {
        vec![InterchangeConfig {
            id: INTERCHANGE.to_string(),
            name: "Nigeria".to_string(),
            country: "NG".to_string(),
            scheme: "tel".to_string(),
            channels: vec![
                ChannelConfig {
                    id: CHANNEL_ONE.to_string(),
                    name: "one".to_string(),
                    url: url_one.to_string(),
                    keywords: vec!["one".to_string()],
                },
                ChannelConfig {
                    id: CHANNEL_TWO.to_string(),
                    name: "two".to_string(),
                    url: url_two.to_string(),
                    keywords: vec!["two".to_string()],
                },
            ],
        }]
    }

    pub async fn state(url_one: &str, url_two: &str) -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.replace_all(&config(url_one, url_two)).await.unwrap();
        let cache = Arc::new(RoutingCache::with_default_ttl(store.clone()));
        let engine = Arc::new(RoutingEngine::new(cache, store.clone()));
        let forwarder = Arc::new(Forwarder::new(&ForwarderConfig::default()).unwrap());
        (AppState::new(engine, forwarder), store)
    }

    pub fn request(method: &str, uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub fn form_request(method: &str, uri: &str, body: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
