//! Deadline-bounded access to the SQLite store.
//!
//! Every storage call made by the auth and reaction cores goes through
//! [`with_conn`] (reads, single statements) or [`immediate`] (compound
//! read-modify-write). Both take a caller-supplied [`Deadline`]: the pool
//! checkout, SQLite's busy wait and statement execution are all bounded by
//! it, and an open transaction is rolled back when it passes.

use std::fmt;
use std::time::{Duration, Instant};

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};

use crate::state::DbPool;

/// How many SQLite VM steps run between deadline checks.
const PROGRESS_STEPS: i32 = 1_000;

/// Point in time after which a storage operation gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// Time left, or `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Storage deadline exceeded")]
    Timeout,
}

impl StoreError {
    /// Errors that may succeed if the same operation is attempted again.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Pool(_) | StoreError::Timeout => true,
            StoreError::Sql(e) => matches!(
                e.sqlite_error_code(),
                Some(
                    ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                        | ErrorCode::OperationInterrupted
                )
            ),
        }
    }
}

/// Component error types that can carry a [`StoreError`].
///
/// Lets the helpers below classify timeouts and decide on retries without
/// knowing the caller's domain errors.
pub trait StoreFailure: From<StoreError> + fmt::Display {
    fn store_error(&self) -> Option<&StoreError>;
}

impl StoreFailure for StoreError {
    fn store_error(&self) -> Option<&StoreError> {
        Some(self)
    }
}

/// Run `f` on a pooled connection, bounded by `deadline`.
pub fn with_conn<T, E>(
    pool: &DbPool,
    deadline: Deadline,
    f: impl FnOnce(&mut Connection) -> Result<T, E>,
) -> Result<T, E>
where
    E: StoreFailure,
{
    let remaining = deadline.remaining().ok_or(StoreError::Timeout)?;
    let mut conn = pool.get_timeout(remaining).map_err(|e| {
        if deadline.is_expired() {
            StoreError::Timeout
        } else {
            StoreError::Pool(e)
        }
    })?;

    conn.busy_timeout(remaining).map_err(StoreError::from)?;
    conn.progress_handler(PROGRESS_STEPS, Some(move || deadline.is_expired()));

    let result = f(&mut *conn);

    conn.progress_handler(PROGRESS_STEPS, None::<fn() -> bool>);

    result.map_err(|e| settle(e, deadline))
}

/// Run `op` inside a `BEGIN IMMEDIATE` transaction and commit it.
///
/// The write lock is taken up front, so concurrent callers serialize
/// instead of failing on lock upgrade. Returning `Err` from `op` rolls the
/// transaction back. A transient failure is retried once if the deadline
/// still allows it.
pub fn immediate<T, E>(
    pool: &DbPool,
    deadline: Deadline,
    mut op: impl FnMut(&Transaction<'_>) -> Result<T, E>,
) -> Result<T, E>
where
    E: StoreFailure,
{
    let mut retried = false;
    loop {
        let result = with_conn(pool, deadline, |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::from)?;
            let value = op(&tx)?;
            if deadline.is_expired() {
                // Dropping `tx` rolls back.
                return Err(StoreError::Timeout.into());
            }
            tx.commit().map_err(StoreError::from)?;
            Ok(value)
        });

        match result {
            Err(e) if !retried && !deadline.is_expired() && is_transient(&e) => {
                tracing::warn!(error = %e, "transient storage error, retrying once");
                retried = true;
            }
            other => return other,
        }
    }
}

fn is_transient<E: StoreFailure>(err: &E) -> bool {
    err.store_error().is_some_and(StoreError::is_transient)
}

/// Busy and interrupt errors after the deadline has passed are timeouts.
fn settle<E: StoreFailure>(err: E, deadline: Deadline) -> E {
    if deadline.is_expired() && is_transient(&err) {
        StoreError::Timeout.into()
    } else {
        err
    }
}
