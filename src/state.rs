use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{CredentialStore, PasswordHasher, SessionManager};
use crate::config::Config;
use crate::db::Deadline;
use crate::forum::ForumStore;
use crate::reactions::ReactionEngine;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub credentials: CredentialStore,
    pub passwords: PasswordHasher,
    pub sessions: SessionManager,
    pub forum: ForumStore,
    pub reactions: ReactionEngine<ForumStore>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Result<Self, bcrypt::BcryptError> {
        let passwords = PasswordHasher::new(config.auth.bcrypt_cost)?;
        let ttl = chrono::Duration::hours(config.auth.session_hours);
        let forum = ForumStore::new(db.clone());

        Ok(Self {
            credentials: CredentialStore::new(db.clone()),
            passwords,
            sessions: SessionManager::new(db.clone(), ttl),
            reactions: ReactionEngine::new(db, forum.clone()),
            forum,
            config,
        })
    }

    /// Deadline for one storage operation started now.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(Duration::from_millis(self.config.database.op_timeout_ms))
    }
}
