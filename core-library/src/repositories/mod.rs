//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! - Traits define the interface the sync engine depends on
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>`
//!
//! ## Available Repositories
//!
//! - `SongCacheRepository` - cached songs per connection profile
//! - `SyncStateRepository` - last-synced time, folder queues and directory summaries

pub mod song_cache;
pub mod sync_state;

pub use song_cache::{SongCacheRepository, SqliteSongCacheRepository, DEFAULT_DELETE_BATCH_SIZE};
pub use sync_state::{SqliteSyncStateRepository, SyncStateRepository};
