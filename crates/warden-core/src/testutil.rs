//! In-memory [`RecordStore`] with the same compare-and-swap semantics as
//! the production SQLite store, for engine unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{CommunityConfig, UserRecord, VersionedRecord};
use crate::store::RecordStore;

#[derive(Default)]
pub(crate) struct MemStore {
    records: Mutex<HashMap<(u64, u64), (UserRecord, i64)>>,
    configs: Mutex<HashMap<u64, CommunityConfig>>,
    store_calls: AtomicUsize,
    conflicts_to_inject: AtomicUsize,
    poisoned: Mutex<Vec<(u64, u64)>>,
}

impl MemStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with a conflict.
    pub(crate) fn inject_conflicts(&self, n: usize) {
        self.conflicts_to_inject.store(n, Ordering::SeqCst);
    }

    /// Make every write for one key fail with a backend error.
    pub(crate) fn poison(&self, community: u64, user: u64) {
        self.poisoned.lock().unwrap().push((community, user));
    }

    /// Number of successful or attempted writes so far.
    pub(crate) fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemStore {
    async fn load(
        &self,
        community: u64,
        user: u64,
    ) -> Result<Option<VersionedRecord>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .get(&(community, user))
            .map(|(record, version)| VersionedRecord {
                record: record.clone(),
                version: *version,
            }))
    }

    async fn store(
        &self,
        record: &UserRecord,
        expected_version: Option<i64>,
    ) -> Result<(), StoreError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .conflicts_to_inject
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Conflict);
        }

        let key = (record.community_id, record.user_id);
        if self.poisoned.lock().unwrap().contains(&key) {
            return Err(StoreError::Backend("poisoned key".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        match (records.get(&key), expected_version) {
            (None, None) => {
                records.insert(key, (record.clone(), 1));
                Ok(())
            }
            (Some((_, current)), Some(expected)) if *current == expected => {
                records.insert(key, (record.clone(), expected + 1));
                Ok(())
            }
            _ => Err(StoreError::Conflict),
        }
    }

    async fn scan_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let records = self.records.lock().unwrap();
        let mut all: Vec<UserRecord> = records.values().map(|(r, _)| r.clone()).collect();
        all.sort_by_key(|r| (r.community_id, r.user_id));
        Ok(all)
    }

    async fn load_config(&self, community: u64) -> Result<Option<CommunityConfig>, StoreError> {
        Ok(self.configs.lock().unwrap().get(&community).cloned())
    }

    async fn save_config(
        &self,
        community: u64,
        config: &CommunityConfig,
    ) -> Result<(), StoreError> {
        self.configs.lock().unwrap().insert(community, config.clone());
        Ok(())
    }
}
