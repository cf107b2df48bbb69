//! Bounded retry for transient storage failures.
//!
//! An idle SQLite connection (or a networked backend behind the same
//! trait) can drop between operations; the pool re-establishes
//! connections, so a short retry is enough to ride out reconnection.
//! Conflicts are not retried here; the ledger retries those with its
//! own budget.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::sleep;
use tracing::warn;

use warden_core::StoreError;

/// Retry budget for transient connection errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before the error surfaces, including the first.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(250),
        }
    }
}

/// Run `op`, retrying transient failures within the policy's budget.
pub(crate) async fn with_retry<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> BoxFuture<'static, sqlx::Result<T>>,
) -> Result<T, StoreError> {
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && attempt < policy.max_attempts => {
                warn!(attempt, error = %e, "transient storage error, retrying");
                attempt += 1;
                sleep(policy.delay).await;
            }
            Err(e) => return Err(store_error(e)),
        }
    }
}

fn is_transient(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

/// Map an sqlx error onto the engine's storage error taxonomy.
pub(crate) fn store_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Connection(error.to_string())
        }
        sqlx::Error::Database(db)
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
        {
            StoreError::Conflict
        }
        _ => StoreError::Backend(error.to_string()),
    }
}
