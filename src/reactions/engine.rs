use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::UserId;
use crate::db::store::{self, Deadline, StoreError, StoreFailure};
use crate::reactions::domain::{Counts, ReactionOutcome, ReactionTarget, Stance};
use crate::state::DbPool;

/// Answers whether a reaction target exists.
///
/// The engine does not own posts or comments. The check runs on the
/// engine's own transaction so the target can't vanish between the check
/// and the write.
pub trait TargetDirectory: Send + Sync {
    fn target_exists(&self, conn: &Connection, target: ReactionTarget) -> rusqlite::Result<bool>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReactionError {
    #[error("{0} not found")]
    TargetNotFound(ReactionTarget),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for ReactionError {
    fn from(e: rusqlite::Error) -> Self {
        ReactionError::Store(e.into())
    }
}

impl StoreFailure for ReactionError {
    fn store_error(&self) -> Option<&StoreError> {
        match self {
            ReactionError::Store(e) => Some(e),
            ReactionError::TargetNotFound(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct ReactionEngine<D> {
    pool: DbPool,
    directory: D,
}

impl<D: TargetDirectory> ReactionEngine<D> {
    pub fn new(pool: DbPool, directory: D) -> Self {
        Self { pool, directory }
    }

    /// Apply one button press by `actor` on `target`.
    ///
    /// Read, compare and write happen in one `IMMEDIATE` transaction, so
    /// presses on the same (actor, target) key are applied one at a time.
    pub fn set_reaction(
        &self,
        actor: UserId,
        target: ReactionTarget,
        pressed: Stance,
        deadline: Deadline,
    ) -> Result<ReactionOutcome, ReactionError> {
        let outcome = store::immediate(&self.pool, deadline, |tx| {
            if !self.directory.target_exists(tx, target)? {
                return Err(ReactionError::TargetNotFound(target));
            }

            let current = stance_in(tx, actor, target)?;
            let next = Stance::toggle(current, pressed);
            match next {
                Some(stance) => tx.execute(
                    "INSERT INTO reactions (actor_id, target_kind, target_id, stance, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(actor_id, target_kind, target_id) DO UPDATE SET
                       stance = excluded.stance,
                       updated_at = excluded.updated_at",
                    params![actor, target.kind(), target.id(), stance, Utc::now()],
                )?,
                None => tx.execute(
                    "DELETE FROM reactions
                     WHERE actor_id = ?1 AND target_kind = ?2 AND target_id = ?3",
                    params![actor, target.kind(), target.id()],
                )?,
            };

            Ok(ReactionOutcome {
                stance: next,
                counts: counts_in(tx, target)?,
            })
        })?;

        tracing::info!(
            %actor,
            %target,
            %pressed,
            stance = outcome.stance.map(|s| s.as_str()).unwrap_or("neutral"),
            "Reaction toggled"
        );
        Ok(outcome)
    }

    pub fn counts_for(
        &self,
        target: ReactionTarget,
        deadline: Deadline,
    ) -> Result<Counts, ReactionError> {
        Ok(store::with_conn(&self.pool, deadline, |conn| {
            counts_in(conn, target).map_err(StoreError::from)
        })?)
    }

    /// The actor's current stance; `None` is neutral.
    pub fn stance_of(
        &self,
        actor: UserId,
        target: ReactionTarget,
        deadline: Deadline,
    ) -> Result<Option<Stance>, ReactionError> {
        Ok(store::with_conn(&self.pool, deadline, |conn| {
            stance_in(conn, actor, target).map_err(StoreError::from)
        })?)
    }
}

fn stance_in(
    conn: &Connection,
    actor: UserId,
    target: ReactionTarget,
) -> rusqlite::Result<Option<Stance>> {
    conn.query_row(
        "SELECT stance FROM reactions
         WHERE actor_id = ?1 AND target_kind = ?2 AND target_id = ?3",
        params![actor, target.kind(), target.id()],
        |row| row.get(0),
    )
    .optional()
}

pub(crate) fn counts_in(conn: &Connection, target: ReactionTarget) -> rusqlite::Result<Counts> {
    conn.query_row(
        "SELECT COALESCE(SUM(stance = 'like'), 0), COALESCE(SUM(stance = 'dislike'), 0)
         FROM reactions WHERE target_kind = ?1 AND target_id = ?2",
        params![target.kind(), target.id()],
        |row| {
            Ok(Counts {
                likes: row.get(0)?,
                dislikes: row.get(1)?,
            })
        },
    )
}
