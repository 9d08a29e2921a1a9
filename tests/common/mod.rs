//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

use pollgate::config::schema::SessionSeed;
use pollgate::config::AppConfig;
use pollgate::domain::{Caller, Principal};
use pollgate::lifecycle::startup;
use pollgate::store::{MemoryStore, Storage};
use pollgate::{AppState, HttpServer, PollService};

pub const HOST: &str = "polls.test";
pub const ADMIN: &str = "root";

/// Config with a known host, one admin and a bearer token per principal.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.security.expected_host = Some(HOST.to_string());
    config.roles.bootstrap_admins = vec![ADMIN.to_string()];
    config.identity.sessions = ["alice", "bob", ADMIN]
        .iter()
        .map(|id| SessionSeed {
            token: token(id),
            principal_id: id.to_string(),
        })
        .collect();
    config
}

pub fn token(principal: &str) -> String {
    format!("token-{}", principal)
}

pub fn caller(principal: &str) -> Caller {
    Caller::new(Principal::authenticated(principal)).with_origin("127.0.0.1|test")
}

pub fn opts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A service over a fresh store, with the admin already granted.
pub async fn service() -> (Arc<MemoryStore>, PollService) {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    startup::apply_bootstrap_admins(store.as_ref(), &config).await.unwrap();
    let service = PollService::new(store.clone(), &config);
    (store, service)
}

/// A fully layered router, as served, over a fresh store.
pub async fn app(config: AppConfig) -> (Arc<MemoryStore>, AppState, Router) {
    let store = Arc::new(MemoryStore::new());
    startup::apply_bootstrap_admins(store.as_ref(), &config).await.unwrap();
    let dyn_store: Arc<dyn Storage> = store.clone();
    let state = startup::build_state(config, dyn_store);
    let router = HttpServer::new(state.clone())
        .into_router()
        .layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 7], 40000))));
    (store, state, router)
}

/// Build a request with the host header set and an optional bearer token.
pub fn request(method: Method, uri: &str, principal: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method.clone())
        .uri(uri)
        .header(header::HOST, HOST)
        .header(header::USER_AGENT, "integration-test");
    if let Some(p) = principal {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(p)));
    }
    if method != Method::GET {
        builder = builder.header(header::ORIGIN, format!("http://{}", HOST));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
