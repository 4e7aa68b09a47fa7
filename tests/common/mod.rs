//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::time::Duration;

use agora::auth::{CredentialStore, PasswordHasher};
use agora::config::Config;
use agora::db::models::UserId;
use agora::db::{self, Deadline};
use agora::state::{AppState, DbPool};
use tempfile::TempDir;

/// Lowest cost bcrypt accepts, to keep tests fast.
pub const TEST_BCRYPT_COST: u32 = 4;

/// A migrated database in its own temporary directory. The directory is
/// removed when this is dropped.
pub struct TestDb {
    pub dir: TempDir,
    pub pool: DbPool,
}

pub fn test_db() -> TestDb {
    let dir = TempDir::new().unwrap();
    let pool = db::create_pool(&dir.path().join("test.db"), 8).expect("Failed to create pool");
    db::run_migrations(&pool).expect("Failed to run migrations");
    TestDb { dir, pool }
}

pub fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(10))
}

pub fn test_config(db: &TestDb) -> Config {
    let mut config = Config::default();
    config.database.path = Some(db.dir.path().join("test.db"));
    config.database.op_timeout_ms = 10_000;
    config.auth.bcrypt_cost = TEST_BCRYPT_COST;
    config
}

pub fn test_state(db: &TestDb) -> AppState {
    AppState::new(db.pool.clone(), test_config(db)).expect("Failed to build state")
}

/// Insert a user directly with a real bcrypt hash of `password`.
pub fn create_user(pool: &DbPool, username: &str, password: &str) -> UserId {
    let hasher = PasswordHasher::new(TEST_BCRYPT_COST).unwrap();
    let hash = hasher.hash(password).unwrap();
    CredentialStore::new(pool.clone())
        .create(
            &format!("{}@example.com", username),
            username,
            &hash,
            deadline(),
        )
        .expect("Failed to create user")
}
