#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, Response};
use figment::{
    Figment,
    providers::{Format, Yaml},
};
use serde_json::Value;
use sessiontron::backend::memory::{
    MemoryBackend, MemoryBackendConfig, MemoryIdentityService, MemoryProfileStore,
};
use sessiontron::config::config_from_yaml;
use sessiontron::routes::create_router;
use sessiontron::startup::build_state;
use sessiontron::state::AppState;

/// Two accounts: Jo has a profile row, Sam does not.
pub const MEMORY_BACKEND: &str = r#"
name: test-memory
users:
  - id: u1
    email: jo@example.com
    password: secret1
    first_name: Jo
    last_name: Lee
  - id: u2
    email: sam@example.com
    password: secret2
    profile: false
"#;

pub const TEST_CONFIG: &str = r#"
version: "1.0.0"
bind_address: "127.0.0.1:0"
logging:
  level: "debug"
  format: "json"
backend:
  type: "memory"
  users:
    - id: u1
      email: jo@example.com
      password: secret1
      first_name: Jo
      last_name: Lee
catalog:
  type: "plain"
  carts:
    - id: "deluxe"
      model_name: "Deluxe Four"
      description: "Four seats, lifted"
      price: 12500
      stock_quantity: 1
      features:
        lights: true
        lift_kit: true
    - id: "classic"
      model_name: "Classic Two"
      price: "6500.00"
      stock_quantity: 0
"#;

pub fn memory_backend(yaml: &str) -> (Arc<MemoryIdentityService>, Arc<MemoryProfileStore>) {
    let config: MemoryBackendConfig = Figment::new()
        .merge(Yaml::string(yaml))
        .extract()
        .expect("memory backend config should parse");
    let backend = MemoryBackend::new(&config).expect("memory backend should build");
    (Arc::new(backend.identity), Arc::new(backend.profiles))
}

pub fn build_app() -> (Router, AppState) {
    let config = config_from_yaml(TEST_CONFIG).expect("test config should parse");
    let state = build_state(Arc::new(config)).expect("state should build");
    (create_router(state.clone()), state)
}

pub fn json_request(method: Method, path: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(path);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("failed to build request"),
        None => builder.body(Body::empty()).expect("failed to build request"),
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

/// Fails the test if `future` takes longer than a few seconds.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
