use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Integer primary key newtypes, so a post id can't be passed where a user
/// id is expected.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

row_id!(UserId);
row_id!(PostId);
row_id!(CommentId);
row_id!(CategoryId);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// One authentication grant. Only `revoked_at` ever changes, and only once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(skip_serializing)]
    pub token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Neither revoked nor expired at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(revoked: bool, expires_in: Duration) -> Session {
        let now = Utc::now();
        Session {
            token: "t".into(),
            user_id: UserId(1),
            created_at: now,
            expires_at: now + expires_in,
            revoked_at: revoked.then_some(now),
        }
    }

    #[test]
    fn fresh_session_is_active() {
        assert!(session(false, Duration::hours(1)).is_active_at(Utc::now()));
    }

    #[test]
    fn revoked_session_is_not_active() {
        assert!(!session(true, Duration::hours(1)).is_active_at(Utc::now()));
    }

    #[test]
    fn session_is_inactive_at_exact_expiry() {
        let s = session(false, Duration::hours(1));
        assert!(!s.is_active_at(s.expires_at));
    }

    #[test]
    fn row_ids_round_trip_through_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let id: PostId = conn
            .query_row("SELECT ?1", [PostId(42)], |row| row.get(0))
            .unwrap();
        assert_eq!(id, PostId(42));
        assert_eq!(id.to_string(), "42");
    }
}
