//! Per-profile sync bookkeeping
//!
//! Everything the engine remembers between runs apart from the songs
//! themselves: the last successful run time, which root folders synced,
//! which failed and are queued for retry, and a content hash per scanned
//! directory.

use crate::error::Result;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use std::collections::HashMap;

#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Epoch milliseconds of the last completed run, if any.
    async fn last_synced(&self, profile_id: &str) -> Result<Option<i64>>;

    async fn update_last_synced(&self, profile_id: &str, timestamp: i64) -> Result<()>;

    /// Root folders whose last scan succeeded, sorted.
    async fn synced_folders(&self, profile_id: &str) -> Result<Vec<String>>;

    /// Replace the synced folder set of a profile.
    async fn replace_synced_folders(&self, profile_id: &str, folders: &[String]) -> Result<()>;

    /// Root folders queued for a retry-only run, sorted.
    async fn failed_folders(&self, profile_id: &str) -> Result<Vec<String>>;

    /// Replace the failed folder queue of a profile, stamping every entry
    /// with `failed_at`.
    async fn replace_failed_folders(
        &self,
        profile_id: &str,
        folders: &[String],
        failed_at: i64,
    ) -> Result<()>;

    /// Directory path to content summary.
    async fn directory_summaries(&self, profile_id: &str) -> Result<HashMap<String, String>>;

    async fn replace_directory_summaries(
        &self,
        profile_id: &str,
        summaries: &HashMap<String, String>,
    ) -> Result<()>;

    /// Forget all bookkeeping of a profile.
    async fn clear_profile(&self, profile_id: &str) -> Result<()>;
}

pub struct SqliteSyncStateRepository {
    pool: SqlitePool,
}

impl SqliteSyncStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncStateRepository for SqliteSyncStateRepository {
    async fn last_synced(&self, profile_id: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            query_as("SELECT last_synced FROM sync_state WHERE profile_id = ?")
                .bind(profile_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(ts,)| ts))
    }

    async fn update_last_synced(&self, profile_id: &str, timestamp: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (profile_id, last_synced) VALUES (?, ?)
            ON CONFLICT(profile_id) DO UPDATE SET last_synced = excluded.last_synced
            "#,
        )
        .bind(profile_id)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn synced_folders(&self, profile_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = query_as(
            "SELECT folder_path FROM synced_folders WHERE profile_id = ? ORDER BY folder_path",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(path,)| path).collect())
    }

    async fn replace_synced_folders(&self, profile_id: &str, folders: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM synced_folders WHERE profile_id = ?")
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;

        for folder in folders {
            sqlx::query(
                "INSERT OR IGNORE INTO synced_folders (profile_id, folder_path) VALUES (?, ?)",
            )
            .bind(profile_id)
            .bind(folder)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn failed_folders(&self, profile_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = query_as(
            "SELECT folder_path FROM failed_folders WHERE profile_id = ? ORDER BY folder_path",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(path,)| path).collect())
    }

    async fn replace_failed_folders(
        &self,
        profile_id: &str,
        folders: &[String],
        failed_at: i64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM failed_folders WHERE profile_id = ?")
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;

        for folder in folders {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO failed_folders (profile_id, folder_path, failed_at)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(profile_id)
            .bind(folder)
            .bind(failed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn directory_summaries(&self, profile_id: &str) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = query_as(
            "SELECT directory_path, summary FROM directory_summaries WHERE profile_id = ?",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn replace_directory_summaries(
        &self,
        profile_id: &str,
        summaries: &HashMap<String, String>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM directory_summaries WHERE profile_id = ?")
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;

        for (directory, summary) in summaries {
            sqlx::query(
                r#"
                INSERT INTO directory_summaries (profile_id, directory_path, summary)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(profile_id)
            .bind(directory)
            .bind(summary)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear_profile(&self, profile_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for table in ["synced_folders", "failed_folders", "directory_summaries"] {
            let sql = format!("DELETE FROM {} WHERE profile_id = ?", table);
            sqlx::query(&sql)
                .bind(profile_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn folders(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_last_synced_roundtrip() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteSyncStateRepository::new(pool);

        assert_eq!(repo.last_synced("p1").await.unwrap(), None);

        repo.update_last_synced("p1", 100).await.unwrap();
        repo.update_last_synced("p1", 200).await.unwrap();

        assert_eq!(repo.last_synced("p1").await.unwrap(), Some(200));
        assert_eq!(repo.last_synced("p2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_folder_sets() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteSyncStateRepository::new(pool);

        repo.replace_synced_folders("p1", &folders(&["/Music", "/Audiobooks"]))
            .await
            .unwrap();
        repo.replace_synced_folders("p1", &folders(&["/Music"]))
            .await
            .unwrap();
        assert_eq!(repo.synced_folders("p1").await.unwrap(), folders(&["/Music"]));

        repo.replace_failed_folders("p1", &folders(&["/Podcasts", "/Podcasts"]), 10)
            .await
            .unwrap();
        assert_eq!(
            repo.failed_folders("p1").await.unwrap(),
            folders(&["/Podcasts"])
        );

        repo.replace_failed_folders("p1", &[], 20).await.unwrap();
        assert!(repo.failed_folders("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_summaries_and_clear() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteSyncStateRepository::new(pool);

        let mut summaries = HashMap::new();
        summaries.insert("/Music".to_string(), "abc".to_string());
        summaries.insert("/Music/Live".to_string(), "def".to_string());
        repo.replace_directory_summaries("p1", &summaries)
            .await
            .unwrap();
        repo.replace_failed_folders("p1", &folders(&["/Podcasts"]), 10)
            .await
            .unwrap();
        repo.update_last_synced("p1", 100).await.unwrap();

        assert_eq!(repo.directory_summaries("p1").await.unwrap(), summaries);

        repo.clear_profile("p1").await.unwrap();

        assert!(repo.directory_summaries("p1").await.unwrap().is_empty());
        assert!(repo.failed_folders("p1").await.unwrap().is_empty());
        assert_eq!(repo.last_synced("p1").await.unwrap(), Some(100));
    }
}
