//! # Song Cache Persistence
//!
//! SQLite storage for songs discovered on remote servers and the per-profile
//! bookkeeping the sync engine needs between runs.
//!
//! ## Overview
//!
//! - Connection pool with WAL mode and embedded migrations ([`db`])
//! - [`CachedSong`](models::CachedSong), unique per profile and remote path
//! - [`SongCacheRepository`](repositories::SongCacheRepository): read, upsert,
//!   batched delete of cached songs
//! - [`SyncStateRepository`](repositories::SyncStateRepository): last-synced
//!   timestamp, synced/failed folder sets, directory summaries

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{is_unknown_artist, CachedSong, UNKNOWN_ALBUM, UNKNOWN_ARTIST};
pub use repositories::{
    SongCacheRepository, SqliteSongCacheRepository, SqliteSyncStateRepository,
    SyncStateRepository, DEFAULT_DELETE_BATCH_SIZE,
};
