//! Song cache repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::CachedSong;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::debug;

/// Number of paths bound into one `DELETE ... IN (...)` statement.
pub const DEFAULT_DELETE_BATCH_SIZE: usize = 300;

/// Access to the cached songs of each connection profile.
#[async_trait]
pub trait SongCacheRepository: Send + Sync {
    /// All cached songs of a profile, ordered by remote path.
    async fn get_cached_entries(&self, profile_id: &str) -> Result<Vec<CachedSong>>;

    /// Insert or replace songs keyed by `(profile_id, remote_path)`.
    ///
    /// All rows are written in a single transaction.
    ///
    /// # Errors
    /// Returns error if:
    /// - Any song fails validation (nothing is written)
    /// - Database error occurs
    async fn upsert_entries(&self, songs: &[CachedSong]) -> Result<()>;

    /// Delete the given remote paths of a profile.
    ///
    /// # Returns
    /// Number of rows actually deleted
    async fn delete_entries_by_path(&self, profile_id: &str, paths: &[String]) -> Result<u64>;

    /// Delete every cached song of a profile.
    ///
    /// # Returns
    /// Number of rows deleted
    async fn delete_all_entries(&self, profile_id: &str) -> Result<u64>;

    /// Count cached songs of a profile
    async fn count_entries(&self, profile_id: &str) -> Result<i64>;
}

/// SQLite implementation of SongCacheRepository
pub struct SqliteSongCacheRepository {
    pool: SqlitePool,
    delete_batch_size: usize,
}

impl SqliteSongCacheRepository {
    /// Create a new SQLite song cache repository
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            delete_batch_size: DEFAULT_DELETE_BATCH_SIZE,
        }
    }

    /// Override the delete batch size (minimum 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.delete_batch_size = batch_size.max(1);
        self
    }
}

#[async_trait]
impl SongCacheRepository for SqliteSongCacheRepository {
    async fn get_cached_entries(&self, profile_id: &str) -> Result<Vec<CachedSong>> {
        let songs = query_as::<_, CachedSong>(
            "SELECT * FROM cached_songs WHERE profile_id = ? ORDER BY remote_path",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(songs)
    }

    async fn upsert_entries(&self, songs: &[CachedSong]) -> Result<()> {
        if songs.is_empty() {
            return Ok(());
        }

        for song in songs {
            song.validate().map_err(|msg| LibraryError::InvalidInput {
                field: "song".to_string(),
                message: msg,
            })?;
        }

        let mut tx = self.pool.begin().await?;

        for song in songs {
            sqlx::query(
                r#"
                INSERT INTO cached_songs (
                    id, profile_id, remote_path,
                    title, artist, artist_id, album, album_id,
                    duration_ms, file_size, content_type, cover_art_path,
                    track_number, year, remote_last_modified, fingerprint, updated_at
                ) VALUES (
                    ?, ?, ?,
                    ?, ?, ?, ?, ?,
                    ?, ?, ?, ?,
                    ?, ?, ?, ?, ?
                )
                ON CONFLICT(profile_id, remote_path) DO UPDATE SET
                    id = excluded.id,
                    title = excluded.title,
                    artist = excluded.artist,
                    artist_id = excluded.artist_id,
                    album = excluded.album,
                    album_id = excluded.album_id,
                    duration_ms = excluded.duration_ms,
                    file_size = excluded.file_size,
                    content_type = excluded.content_type,
                    cover_art_path = excluded.cover_art_path,
                    track_number = excluded.track_number,
                    year = excluded.year,
                    remote_last_modified = excluded.remote_last_modified,
                    fingerprint = excluded.fingerprint,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(song.id)
            .bind(&song.profile_id)
            .bind(&song.remote_path)
            .bind(&song.title)
            .bind(&song.artist)
            .bind(song.artist_id)
            .bind(&song.album)
            .bind(song.album_id)
            .bind(song.duration_ms)
            .bind(song.file_size)
            .bind(&song.content_type)
            .bind(&song.cover_art_path)
            .bind(song.track_number)
            .bind(song.year)
            .bind(song.remote_last_modified)
            .bind(&song.fingerprint)
            .bind(song.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(count = songs.len(), "Upserted cached songs");
        Ok(())
    }

    async fn delete_entries_by_path(&self, profile_id: &str, paths: &[String]) -> Result<u64> {
        if paths.is_empty() {
            return Ok(0);
        }

        let mut deleted = 0;
        for chunk in paths.chunks(self.delete_batch_size) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "DELETE FROM cached_songs WHERE profile_id = ? AND remote_path IN ({})",
                placeholders
            );

            let mut query = sqlx::query(&sql).bind(profile_id);
            for path in chunk {
                query = query.bind(path);
            }

            deleted += query.execute(&self.pool).await?.rows_affected();
        }

        debug!(profile_id, requested = paths.len(), deleted, "Deleted cached songs");
        Ok(deleted)
    }

    async fn delete_all_entries(&self, profile_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cached_songs WHERE profile_id = ?")
            .bind(profile_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_entries(&self, profile_id: &str) -> Result<i64> {
        let count: (i64,) = query_as("SELECT COUNT(*) FROM cached_songs WHERE profile_id = ?")
            .bind(profile_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
