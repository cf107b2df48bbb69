use warden_core::StoreError;

use crate::retry::store_error;
use crate::SqliteStore;

impl SqliteStore {
    pub(crate) async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_records (
                community_id       TEXT NOT NULL,
                user_id            TEXT NOT NULL,
                points             INTEGER NOT NULL DEFAULT 0,
                status             TEXT NOT NULL,
                notes              TEXT NOT NULL DEFAULT '',
                log_json           TEXT NOT NULL DEFAULT '[]',
                last_notified_tier TEXT,
                version            INTEGER NOT NULL DEFAULT 1,
                created_at         TEXT NOT NULL,
                updated_at         TEXT NOT NULL,
                PRIMARY KEY (community_id, user_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_records_points
             ON user_records(points)",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS community_configs (
                community_id        TEXT PRIMARY KEY,
                authorizer_role     TEXT,
                filtered_terms_json TEXT NOT NULL DEFAULT '{}',
                updated_at          TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }
}
