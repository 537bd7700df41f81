//! Shared helpers for router tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ph_api::{build_router, AppState};
use ph_core::config::{AppConfig, DatabaseConfig};
use ph_core::error::{PhError, PhResult};
use ph_models::Database;
use ph_services::store::{KeyValueStore, MemoryStore};
use ph_services::ServiceRegistry;

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub router: Router,
    pub registry: Arc<ServiceRegistry>,
    pub config: AppConfig,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new("test")))
    }

    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let db = Database::init(&dir.path().join("test.db"), &DatabaseConfig::default())
            .expect("failed to init test database");
        let config = AppConfig::default();
        let registry = Arc::new(ServiceRegistry::with_store(&config, db, store));
        registry.init_all().expect("failed to init services");

        let router = build_router(AppState::new(registry.clone(), config.clone()));
        Self {
            router,
            registry,
            config,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("router is infallible")
    }

    /// Sign up through the API and return the session cookie header value.
    pub async fn sign_up(&self, username: &str) -> String {
        let response = self
            .send(post_json(
                "/api/auth/signup",
                serde_json::json!({
                    "email": format!("{username}@example.com"),
                    "username": username,
                    "password": PASSWORD,
                }),
                None,
            ))
            .await;
        assert_eq!(response.status(), 201);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Mark a request as coming from `ip`.
pub fn from_ip(mut request: Request<Body>, ip: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-forwarded-for", ip.parse().expect("valid header value"));
    request
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A store whose every command fails.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> PhResult<Option<String>> {
        Err(PhError::Store("connection refused".into()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> PhResult<()> {
        Err(PhError::Store("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> PhResult<bool> {
        Err(PhError::Store("connection refused".into()))
    }

    async fn incr_with_expiry(&self, _key: &str, _ttl: Duration) -> PhResult<i64> {
        Err(PhError::Store("connection refused".into()))
    }

    async fn decr(&self, _key: &str) -> PhResult<i64> {
        Err(PhError::Store("connection refused".into()))
    }

    async fn ping(&self) -> PhResult<()> {
        Err(PhError::Store("connection refused".into()))
    }
}
