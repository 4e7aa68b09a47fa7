//! Session issuance, validation and revocation.
//!
//! A user has at most one active session. `issue` revokes every prior
//! non-revoked session and inserts the new one inside a single `IMMEDIATE`
//! transaction; the partial unique index `sessions_one_active_per_user`
//! backs the same rule in the schema. Expiry is checked on read and never
//! written back. Rows are never deleted.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::models::{Session, UserId};
use crate::db::store::{self, Deadline, StoreError, StoreFailure};
use crate::state::DbPool;

pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Opaque, unguessable session token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// 32 random bytes, hex encoded.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// Result of a successful `issue`: the caller hands both values to the
/// transport (cookie value and expiry) unchanged.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: SessionToken,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated user behind a valid session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("user {user_id} has {active} non-revoked sessions")]
    InvariantViolation { user_id: UserId, active: i64 },
}

impl From<rusqlite::Error> for SessionError {
    fn from(e: rusqlite::Error) -> Self {
        SessionError::Store(e.into())
    }
}

impl StoreFailure for SessionError {
    fn store_error(&self) -> Option<&StoreError> {
        match self {
            SessionError::Store(e) => Some(e),
            SessionError::InvariantViolation { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct SessionManager {
    pool: DbPool,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(pool: DbPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Start a new session for `user_id`, revoking any previous one.
    pub fn issue(
        &self,
        user_id: UserId,
        deadline: Deadline,
    ) -> Result<IssuedSession, SessionError> {
        let (issued, revoked) = store::immediate(&self.pool, deadline, |tx| {
            let now = Utc::now();
            let revoked = tx.execute(
                "UPDATE sessions SET revoked_at = ?1 WHERE user_id = ?2 AND revoked_at IS NULL",
                params![now, user_id],
            )?;

            let token = SessionToken::generate();
            let expires_at = now + self.ttl;
            tx.execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token.as_str(), user_id, now, expires_at],
            )?;

            let active = count_non_revoked(tx, user_id)?;
            if active != 1 {
                tracing::error!(
                    %user_id,
                    active,
                    "single-session invariant violated during issue"
                );
                return Err(SessionError::InvariantViolation { user_id, active });
            }

            Ok((IssuedSession { token, expires_at }, revoked))
        })?;

        tracing::info!(%user_id, revoked, expires_at = %issued.expires_at, "Session issued");
        Ok(issued)
    }

    /// Resolve a token to its owner. Unknown, revoked and expired tokens all
    /// come back as `Ok(None)`.
    pub fn validate(
        &self,
        token: &str,
        deadline: Deadline,
    ) -> Result<Option<Identity>, SessionError> {
        let row = store::with_conn(&self.pool, deadline, |conn| {
            conn.query_row(
                "SELECT s.user_id, u.username, s.expires_at, s.revoked_at
                 FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1",
                params![token],
                |row| {
                    Ok((
                        row.get::<_, UserId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, DateTime<Utc>>(2)?,
                        row.get::<_, Option<DateTime<Utc>>>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::from)
        })?;

        let now = Utc::now();
        Ok(row.and_then(|(user_id, username, expires_at, revoked_at)| {
            (revoked_at.is_none() && now < expires_at).then_some(Identity { user_id, username })
        }))
    }

    /// Mark a session revoked. Unknown and already revoked tokens are a
    /// silent success.
    pub fn revoke(&self, token: &str, deadline: Deadline) -> Result<(), SessionError> {
        let changed = store::with_conn(&self.pool, deadline, |conn| {
            conn.execute(
                "UPDATE sessions SET revoked_at = ?1 WHERE token = ?2 AND revoked_at IS NULL",
                params![Utc::now(), token],
            )
            .map_err(StoreError::from)
        })?;

        tracing::debug!(changed, "Session revoke");
        Ok(())
    }

    /// Look up a session row by token, whatever its state.
    pub fn find(&self, token: &str, deadline: Deadline) -> Result<Option<Session>, SessionError> {
        Ok(store::with_conn(&self.pool, deadline, |conn| {
            conn.query_row(
                "SELECT token, user_id, created_at, expires_at, revoked_at
                 FROM sessions WHERE token = ?1",
                params![token],
                session_from_row,
            )
            .optional()
            .map_err(StoreError::from)
        })?)
    }

    /// The user's single active session, if any.
    ///
    /// More than one non-revoked row is a storage defect and is reported as
    /// [`SessionError::InvariantViolation`] rather than picking one.
    pub fn active_for(
        &self,
        user_id: UserId,
        deadline: Deadline,
    ) -> Result<Option<Session>, SessionError> {
        let rows: Vec<Session> = store::with_conn(&self.pool, deadline, |conn| {
            let mut stmt = conn.prepare(
                "SELECT token, user_id, created_at, expires_at, revoked_at
                 FROM sessions WHERE user_id = ?1 AND revoked_at IS NULL",
            )?;
            let rows = stmt
                .query_map(params![user_id], session_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, StoreError>(rows)
        })?;

        if rows.len() > 1 {
            let active = rows.len() as i64;
            tracing::error!(%user_id, active, "single-session invariant violated on read");
            return Err(SessionError::InvariantViolation { user_id, active });
        }

        let now = Utc::now();
        Ok(rows.into_iter().find(|s| s.is_active_at(now)))
    }

    /// Every session the user ever had, newest first.
    pub fn history(
        &self,
        user_id: UserId,
        deadline: Deadline,
    ) -> Result<Vec<Session>, SessionError> {
        Ok(store::with_conn(&self.pool, deadline, |conn| {
            let mut stmt = conn.prepare(
                "SELECT token, user_id, created_at, expires_at, revoked_at
                 FROM sessions WHERE user_id = ?1
                 ORDER BY rowid DESC",
            )?;
            let rows = stmt
                .query_map(params![user_id], session_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, StoreError>(rows)
        })?)
    }
}

fn count_non_revoked(conn: &rusqlite::Connection, user_id: UserId) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM sessions WHERE user_id = ?1 AND revoked_at IS NULL",
        params![user_id],
        |row| row.get(0),
    )
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        token: row.get(0)?,
        user_id: row.get(1)?,
        created_at: row.get(2)?,
        expires_at: row.get(3)?,
        revoked_at: row.get(4)?,
    })
}
