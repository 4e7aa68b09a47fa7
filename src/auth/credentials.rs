//! User records: e-mail, username and password hash.
//!
//! This store never hashes or compares passwords; see
//! [`crate::auth::password`].

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{User, UserId};
use crate::db::store::{self, Deadline, StoreError, StoreFailure};
use crate::state::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("User not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for CredentialError {
    fn from(e: rusqlite::Error) -> Self {
        CredentialError::Store(e.into())
    }
}

impl StoreFailure for CredentialError {
    fn store_error(&self) -> Option<&StoreError> {
        match self {
            CredentialError::Store(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    pool: DbPool,
}

impl CredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new user. E-mail and username are unique (case-insensitive);
    /// when both collide the e-mail conflict is reported.
    pub fn create(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        deadline: Deadline,
    ) -> Result<UserId, CredentialError> {
        let user_id = store::immediate(&self.pool, deadline, |tx| {
            let inserted = tx.execute(
                "INSERT INTO users (email, username, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![email, username, password_hash, Utc::now()],
            );
            match inserted {
                Ok(_) => Ok(UserId(tx.last_insert_rowid())),
                Err(e) if is_unique_violation(&e) => Err(duplicate_field(tx, email, username, e)),
                Err(e) => Err(e.into()),
            }
        })?;

        tracing::info!(%user_id, "User registered");
        Ok(user_id)
    }

    pub fn find_by_email(&self, email: &str, deadline: Deadline) -> Result<User, CredentialError> {
        self.find_one("WHERE email = ?1", params![email], deadline)
    }

    pub fn find_by_id(&self, id: UserId, deadline: Deadline) -> Result<User, CredentialError> {
        self.find_one("WHERE id = ?1", params![id], deadline)
    }

    fn find_one(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
        deadline: Deadline,
    ) -> Result<User, CredentialError> {
        let sql = format!(
            "SELECT id, email, username, password_hash, created_at FROM users {}",
            filter
        );
        store::with_conn(&self.pool, deadline, |conn| {
            conn.query_row(&sql, args, |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    username: row.get(2)?,
                    password_hash: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .optional()
            .map_err(StoreError::from)
        })?
        .ok_or(CredentialError::NotFound)
    }
}

/// Structured check on the extended result code; the message text is not
/// inspected.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Work out which unique key a failed insert collided with by probing the
/// keys inside the same write transaction.
fn duplicate_field(
    conn: &Connection,
    email: &str,
    username: &str,
    original: rusqlite::Error,
) -> CredentialError {
    let taken = |sql: &str, value: &str| -> rusqlite::Result<bool> {
        conn.query_row(sql, params![value], |row| row.get(0))
    };

    match taken("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)", email) {
        Ok(true) => return CredentialError::DuplicateEmail,
        Ok(false) => {}
        Err(e) => return e.into(),
    }
    match taken(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        username,
    ) {
        Ok(true) => CredentialError::DuplicateUsername,
        Ok(false) => original.into(),
        Err(e) => e.into(),
    }
}
