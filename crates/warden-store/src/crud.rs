use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

use warden_core::{
    AuditLog, CommunityConfig, RecordStore, StoreError, Tier, UserRecord, VersionedRecord,
};

use crate::retry::{store_error, with_retry};
use crate::SqliteStore;

const RECORD_COLUMNS: &str = "community_id, user_id, points, status, notes, log_json, \
                              last_notified_tier, version";

#[async_trait]
impl RecordStore for SqliteStore {
    async fn load(
        &self,
        community: u64,
        user: u64,
    ) -> Result<Option<VersionedRecord>, StoreError> {
        let pool = self.pool.clone();
        let row = with_retry(&self.retry, move || {
            let pool = pool.clone();
            Box::pin(async move {
                sqlx::query(&format!(
                    "SELECT {RECORD_COLUMNS} FROM user_records
                     WHERE community_id = ?1 AND user_id = ?2"
                ))
                .bind(community.to_string())
                .bind(user.to_string())
                .fetch_optional(&pool)
                .await
            })
        })
        .await?;

        row.as_ref().map(decode_versioned).transpose()
    }

    async fn store(
        &self,
        record: &UserRecord,
        expected_version: Option<i64>,
    ) -> Result<(), StoreError> {
        let log_json = serde_json::to_string(&record.log)?;
        let marker = record.last_notified_tier.map(|t| t.as_str().to_string());
        let now = Utc::now().to_rfc3339();
        let community = record.community_id.to_string();
        let user = record.user_id.to_string();
        let points = record.points;
        let status = record.status.as_str().to_string();
        let notes = record.notes.clone();

        match expected_version {
            None => {
                let pool = self.pool.clone();
                with_retry(&self.retry, move || {
                    let pool = pool.clone();
                    let (community, user, status, notes, log_json, marker, now) = (
                        community.clone(),
                        user.clone(),
                        status.clone(),
                        notes.clone(),
                        log_json.clone(),
                        marker.clone(),
                        now.clone(),
                    );
                    Box::pin(async move {
                        sqlx::query(
                            "INSERT INTO user_records
                             (community_id, user_id, points, status, notes, log_json,
                              last_notified_tier, version, created_at, updated_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
                        )
                        .bind(community)
                        .bind(user)
                        .bind(points)
                        .bind(status)
                        .bind(notes)
                        .bind(log_json)
                        .bind(marker)
                        .bind(now)
                        .execute(&pool)
                        .await
                    })
                })
                .await?;
                Ok(())
            }
            Some(expected) => {
                let pool = self.pool.clone();
                let result = with_retry(&self.retry, move || {
                    let pool = pool.clone();
                    let (community, user, status, notes, log_json, marker, now) = (
                        community.clone(),
                        user.clone(),
                        status.clone(),
                        notes.clone(),
                        log_json.clone(),
                        marker.clone(),
                        now.clone(),
                    );
                    Box::pin(async move {
                        sqlx::query(
                            "UPDATE user_records
                             SET points = ?3, status = ?4, notes = ?5, log_json = ?6,
                                 last_notified_tier = ?7, version = version + 1,
                                 updated_at = ?8
                             WHERE community_id = ?1 AND user_id = ?2 AND version = ?9",
                        )
                        .bind(community)
                        .bind(user)
                        .bind(points)
                        .bind(status)
                        .bind(notes)
                        .bind(log_json)
                        .bind(marker)
                        .bind(now)
                        .bind(expected)
                        .execute(&pool)
                        .await
                    })
                })
                .await?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict);
                }
                Ok(())
            }
        }
    }

    async fn scan_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let pool = self.pool.clone();
        let rows = with_retry(&self.retry, move || {
            let pool = pool.clone();
            Box::pin(async move {
                sqlx::query(&format!(
                    "SELECT {RECORD_COLUMNS} FROM user_records
                     ORDER BY community_id, user_id"
                ))
                .fetch_all(&pool)
                .await
            })
        })
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_versioned(row) {
                Ok(versioned) => records.push(versioned.record),
                // One corrupt row must not sink the whole scan.
                Err(e) => warn!(error = %e, "skipping undecodable user record"),
            }
        }
        Ok(records)
    }

    async fn load_config(&self, community: u64) -> Result<Option<CommunityConfig>, StoreError> {
        let pool = self.pool.clone();
        let row = with_retry(&self.retry, move || {
            let pool = pool.clone();
            Box::pin(async move {
                sqlx::query(
                    "SELECT authorizer_role, filtered_terms_json FROM community_configs
                     WHERE community_id = ?1",
                )
                .bind(community.to_string())
                .fetch_optional(&pool)
                .await
            })
        })
        .await?;

        row.map(|row| decode_config(&row, community)).transpose()
    }

    async fn save_config(
        &self,
        community: u64,
        config: &CommunityConfig,
    ) -> Result<(), StoreError> {
        let terms_json = serde_json::to_string(&config.filtered_terms)?;
        let role = config.authorizer_role.clone();
        let now = Utc::now().to_rfc3339();
        let pool = self.pool.clone();
        with_retry(&self.retry, move || {
            let pool = pool.clone();
            let (role, terms_json, now) = (role.clone(), terms_json.clone(), now.clone());
            Box::pin(async move {
                sqlx::query(
                    "INSERT INTO community_configs
                     (community_id, authorizer_role, filtered_terms_json, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(community_id) DO UPDATE SET
                        authorizer_role = excluded.authorizer_role,
                        filtered_terms_json = excluded.filtered_terms_json,
                        updated_at = excluded.updated_at",
                )
                .bind(community.to_string())
                .bind(role)
                .bind(terms_json)
                .bind(now)
                .execute(&pool)
                .await
            })
        })
        .await?;
        Ok(())
    }
}

// ── Row decoding ────────────────────────────────────────────────

fn decode_versioned(row: &SqliteRow) -> Result<VersionedRecord, StoreError> {
    let community_id = decode_id(row, "community_id")?;
    let user_id = decode_id(row, "user_id")?;

    let status_str: String = row.try_get("status").map_err(store_error)?;
    let status = status_str.parse::<Tier>().unwrap_or_else(|e| {
        warn!(community_id, user_id, error = %e, "unknown persisted status, treating as active");
        Tier::Active
    });

    // A malformed log is treated as empty for this operation; the
    // anomaly is logged and everything else proceeds.
    let log_json: String = row.try_get("log_json").map_err(store_error)?;
    let log = serde_json::from_str::<AuditLog>(&log_json).unwrap_or_else(|e| {
        warn!(community_id, user_id, error = %e, "malformed audit log, treating as empty");
        AuditLog::new()
    });

    let marker: Option<String> = row.try_get("last_notified_tier").map_err(store_error)?;
    let last_notified_tier = marker.and_then(|s| match s.parse::<Tier>() {
        Ok(tier) => Some(tier),
        Err(e) => {
            warn!(community_id, user_id, error = %e, "unknown notification marker, clearing");
            None
        }
    });

    Ok(VersionedRecord {
        record: UserRecord {
            community_id,
            user_id,
            points: row.try_get("points").map_err(store_error)?,
            status,
            notes: row.try_get("notes").map_err(store_error)?,
            log,
            last_notified_tier,
        },
        version: row.try_get("version").map_err(store_error)?,
    })
}

fn decode_id(row: &SqliteRow, column: &str) -> Result<u64, StoreError> {
    let raw: String = row.try_get(column).map_err(store_error)?;
    raw.parse::<u64>()
        .map_err(|e| StoreError::Backend(format!("invalid {column} `{raw}`: {e}")))
}

fn decode_config(row: &SqliteRow, community: u64) -> Result<CommunityConfig, StoreError> {
    let terms_json: String = row.try_get("filtered_terms_json").map_err(store_error)?;
    let filtered_terms = serde_json::from_str(&terms_json).unwrap_or_else(|e| {
        warn!(community, error = %e, "malformed filtered terms, treating as empty");
        Default::default()
    });
    Ok(CommunityConfig {
        authorizer_role: row.try_get("authorizer_role").map_err(store_error)?,
        filtered_terms,
    })
}
