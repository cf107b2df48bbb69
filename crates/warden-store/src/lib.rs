//! SQLite persistence for the Warden moderation engine.
//!
//! Implements [`warden_core::RecordStore`] over an `sqlx` SQLite pool.
//! Records are one row per (community, user); the audit log is encoded
//! as JSON here, at the storage boundary, and nowhere else. Writes are
//! versioned compare-and-swap so the ledger's retry loop can serialize
//! concurrent mutators without a lost update.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod crud;
mod migrations;
mod retry;


pub use retry::RetryPolicy;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use warden_core::StoreError;

/// SQLite-backed record store.
#[derive(Clone)]
pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
    pub(crate) retry: RetryPolicy,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub async fn from_path(db_path: &std::path::Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("mkdir: {e}")))?;
        }
        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(retry::store_error)?;

        // Enable WAL for read/write concurrency
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await
            .map_err(retry::store_error)?;

        let store = Self {
            pool,
            retry: RetryPolicy::default(),
        };
        store.run_migrations().await?;
        info!("record store initialized at {}", db_path.display());
        Ok(store)
    }

    /// In-memory store (for tests).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(retry::store_error)?;
        let store = Self {
            pool,
            retry: RetryPolicy::default(),
        };
        store.run_migrations().await?;
        debug!("in-memory record store initialized");
        Ok(store)
    }

    /// Override the transient-error retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
