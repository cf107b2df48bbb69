//! Storage seam consumed by the engine.
//!
//! The engine never touches a database directly; it talks to this trait.
//! The production implementation lives in `warden-store` (SQLite via
//! sqlx). Encoding to the persisted representation is entirely the
//! implementation's concern.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{CommunityConfig, UserRecord, VersionedRecord};

/// Durable keyed storage for user records and community configuration.
///
/// Writes use optimistic concurrency: [`RecordStore::store`] must reject
/// a write whose expected version no longer matches with
/// [`StoreError::Conflict`], and must apply all record fields as one
/// atomic unit. Implementations are expected to reconnect after transient
/// connectivity loss with a bounded retry budget before surfacing
/// [`StoreError::Connection`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a record with its current version, `None` if absent.
    async fn load(
        &self,
        community: u64,
        user: u64,
    ) -> Result<Option<VersionedRecord>, StoreError>;

    /// Persist all fields of `record` atomically.
    ///
    /// `expected_version` of `None` means "create"; creation of an
    /// already-existing key is a conflict, as is an update whose version
    /// has moved.
    async fn store(
        &self,
        record: &UserRecord,
        expected_version: Option<i64>,
    ) -> Result<(), StoreError>;

    /// Enumerate every user record across all communities.
    async fn scan_all(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Load a community's configuration, `None` if never written.
    async fn load_config(&self, community: u64) -> Result<Option<CommunityConfig>, StoreError>;

    /// Create or replace a community's configuration.
    async fn save_config(
        &self,
        community: u64,
        config: &CommunityConfig,
    ) -> Result<(), StoreError>;
}
