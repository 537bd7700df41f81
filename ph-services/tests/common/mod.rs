//! Shared test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use ph_core::config::{AppConfig, DatabaseConfig};
use ph_core::constants::roles;
use ph_core::error::{PhError, PhResult};
use ph_models::{Database, Profile};
use ph_services::auth::AuthUser;
use ph_services::proverb::ProverbInput;
use ph_services::store::{KeyValueStore, MemoryStore};
use ph_services::ServiceRegistry;

pub const PASSWORD: &str = "correct-horse-battery";

/// Create a temporary database with full schema and migrations applied.
/// Returns the Database and the TempDir (must be held alive for the duration of the test).
pub fn create_test_db() -> (Database, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("test.db");
    let config = DatabaseConfig::default();
    let db = Database::init(&path, &config).expect("failed to init test database");
    (db, dir)
}

/// A fully initialized registry on an in-process store.
pub fn create_test_registry() -> (ServiceRegistry, TempDir) {
    create_test_registry_with_store(Arc::new(MemoryStore::new("test")))
}

pub fn create_test_registry_with_store(store: Arc<dyn KeyValueStore>) -> (ServiceRegistry, TempDir) {
    let (db, dir) = create_test_db();
    let registry = ServiceRegistry::with_store(&AppConfig::default(), db, store);
    registry.init_all().expect("failed to init services");
    (registry, dir)
}

/// Sign up `username` with `<username>@example.com` and the shared password.
pub fn sign_up(registry: &ServiceRegistry, username: &str) -> AuthUser {
    registry
        .auth
        .sign_up(&format!("{username}@example.com"), username, PASSWORD, Some("127.0.0.1"))
        .expect("failed to sign up test user")
        .user
}

/// Sign up a user and promote them to admin.
pub fn sign_up_admin(registry: &ServiceRegistry, username: &str) -> AuthUser {
    let mut user = sign_up(registry, username);
    let conn = registry.database.conn().expect("failed to get connection");
    Profile::set_role(&conn, user.id, roles::ADMIN).expect("failed to promote admin");
    user.role = roles::ADMIN.to_string();
    user
}

pub fn publish(registry: &ServiceRegistry, author: &AuthUser, content: &str) -> i64 {
    registry
        .proverbs
        .create(
            author,
            &ProverbInput {
                content: content.to_string(),
                origin: Some("Akan".into()),
                meaning: None,
            },
        )
        .expect("failed to publish proverb")
        .id
}

/// A store whose every command fails, standing in for an unreachable Redis.
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
