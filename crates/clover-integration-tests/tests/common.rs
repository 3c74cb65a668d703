//! Common test utilities for integration tests

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clover_core::{ChannelConfig, InterchangeConfig};
use clover_egress::{Forwarder, ForwarderConfig};
use clover_ingress::{AdminCredentials, AppState, build_router};
use clover_routing::{RoutingCache, RoutingEngine};
use clover_store_sqlite::SqliteStore;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "s3cret";

/// Router plus the store behind it
#[allow(dead_code)]
pub struct Gateway {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub engine: Arc<RoutingEngine>,
}

#[allow(dead_code)]
impl Gateway {
    /// Gateway over an empty, migrated SQLite in-memory store
    pub async fn start() -> Self {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let cache = Arc::new(RoutingCache::with_default_ttl(store.clone()));
        let engine = Arc::new(RoutingEngine::new(cache, store.clone()));
        let forwarder = Arc::new(Forwarder::new(&ForwarderConfig::default()).unwrap());

        let state = AppState::new(engine.clone(), forwarder)
            .with_admin(AdminCredentials::new(ADMIN_USER, ADMIN_PASSWORD));

        Self {
            router: build_router(state),
            store,
            engine,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Submit a configuration through `POST /admin`
    pub async fn submit_config(&self, configs: &[InterchangeConfig]) -> Response {
        let json = serde_json::to_string(configs).unwrap();
        self.submit_raw_config(&json).await
    }

    pub async fn submit_raw_config(&self, json: &str) -> Response {
        let body = serde_urlencoded::to_string([("config", json)]).unwrap();
        self.send(admin_request("POST", "/admin", Some(body))).await
    }

    pub async fn receive(&self, interchange: &str, sender: &str, message: &str) -> Response {
        let query = serde_urlencoded::to_string([("sender", sender), ("message", message)])
            .unwrap();
        self.send(
            Request::builder()
                .method("GET")
                .uri(format!("/i/{}/receive?{}", interchange, query))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

/// Request carrying valid admin credentials
#[allow(dead_code)]
pub fn admin_request(method: &str, uri: &str, form: Option<String>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            "authorization",
            format!(
                "Basic {}",
                STANDARD.encode(format!("{}:{}", ADMIN_USER, ADMIN_PASSWORD))
            ),
        );

    match form {
        Some(form) => builder
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[allow(dead_code)]
pub fn channel(id: &str, name: &str, url: &str, keywords: &[&str]) -> ChannelConfig {
    ChannelConfig {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

#[allow(dead_code)]
pub fn interchange(id: &str, name: &str, channels: Vec<ChannelConfig>) -> InterchangeConfig {
    InterchangeConfig {
        id: id.to_string(),
        name: name.to_string(),
        country: "NG".to_string(),
        scheme: "tel".to_string(),
        channels,
    }
}

#[allow(dead_code)]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[allow(dead_code)]
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
