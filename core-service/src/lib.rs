//! Core service façade and bootstrap helpers.
//!
//! Wires host-provided bridges (HTTP, secure storage, configuration) into a
//! ready [`SyncService`]: SQLite pool and repositories, the WebDAV transport
//! and the sync coordinator. Desktop apps typically enable the
//! `desktop-shims` feature so the reqwest HTTP client and the OS keyring are
//! used when nothing else is injected.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::SyncService;
//!
//! let config = CoreConfig::builder().database_path("/data/songs.db").build()?;
//! let service = SyncService::bootstrap(config).await?;
//! let outcome = service.sync(&profile).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{ConnectionProfile, RemoteTransport};
use core_library::{
    create_pool, CachedSong, DatabaseConfig, SongCacheRepository, SqliteSongCacheRepository,
    SqliteSyncStateRepository, SyncStateRepository,
};
use core_runtime::config::{ConfigProvider, CoreConfig};
use core_runtime::events::{EventBus, EventStream};
use core_sync::{SyncCoordinator, SyncJobId, SyncOutcome};
use provider_webdav::{TimeoutSource, WebDavTransport};
use sqlx::{Pool, Sqlite};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Capacity of the broadcast channel carrying sync and cache events.
const EVENT_BUS_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct SyncService {
    coordinator: Arc<SyncCoordinator>,
    songs: Arc<dyn SongCacheRepository>,
    state: Arc<dyn SyncStateRepository>,
    event_bus: EventBus,
}

impl SyncService {
    /// Open (and migrate) the song cache at `config.database_path` and wire
    /// the WebDAV transport from the configured bridges.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Library`] if the database cannot be opened or
    /// migrated.
    #[instrument(skip(config), fields(database = %config.database_path.display()))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;

        let transport = WebDavTransport::new(config.http_client, config.secure_store)
            .with_request_timeout_source(request_timeout_source(&config.config_provider));

        info!("Sync service ready");
        Ok(Self::from_parts(
            pool,
            Arc::new(transport),
            config.config_provider,
        ))
    }

    /// Assemble a service from an existing pool and transport.
    pub fn from_parts(
        pool: Pool<Sqlite>,
        transport: Arc<dyn RemoteTransport>,
        config_provider: Arc<dyn ConfigProvider>,
    ) -> Self {
        let songs: Arc<dyn SongCacheRepository> =
            Arc::new(SqliteSongCacheRepository::new(pool.clone()));
        let state: Arc<dyn SyncStateRepository> = Arc::new(SqliteSyncStateRepository::new(pool));
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

        let coordinator = SyncCoordinator::new(
            transport,
            Arc::clone(&songs),
            Arc::clone(&state),
            config_provider,
            event_bus.clone(),
        );

        Self {
            coordinator: Arc::new(coordinator),
            songs,
            state,
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to sync progress and cache change events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Run a full sync of every selected folder. Cancel with
    /// [`cancel_sync`](Self::cancel_sync).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ProfileDisabled`] for disabled profiles, otherwise
    /// whatever the coordinator reports.
    pub async fn sync(&self, profile: &ConnectionProfile) -> Result<SyncOutcome> {
        ensure_enabled(profile)?;
        Ok(self
            .coordinator
            .sync(profile, CancellationToken::new())
            .await?)
    }

    /// Rescan only the folders queued as failed by earlier runs.
    ///
    /// # Errors
    ///
    /// Same as [`sync`](Self::sync).
    pub async fn retry_failed_folders(&self, profile: &ConnectionProfile) -> Result<SyncOutcome> {
        ensure_enabled(profile)?;
        Ok(self
            .coordinator
            .retry_failed_folders(profile, CancellationToken::new())
            .await?)
    }

    pub fn cancel_sync(&self, profile_id: &str) -> Option<SyncJobId> {
        self.coordinator.cancel_sync(profile_id)
    }

    pub fn is_syncing(&self, profile_id: &str) -> bool {
        self.coordinator.is_syncing(profile_id)
    }

    /// Forget everything cached for a profile.
    pub async fn clear_profile(&self, profile_id: &str) -> Result<u64> {
        Ok(self.coordinator.clear_profile(profile_id).await?)
    }

    pub async fn cached_songs(&self, profile_id: &str) -> Result<Vec<CachedSong>> {
        Ok(self.songs.get_cached_entries(profile_id).await?)
    }

    /// Folders waiting for [`retry_failed_folders`](Self::retry_failed_folders).
    pub async fn failed_folders(&self, profile_id: &str) -> Result<Vec<String>> {
        Ok(self.state.failed_folders(profile_id).await?)
    }

    /// Epoch milliseconds of the last completed run.
    pub async fn last_synced(&self, profile_id: &str) -> Result<Option<i64>> {
        Ok(self.state.last_synced(profile_id).await?)
    }
}

fn ensure_enabled(profile: &ConnectionProfile) -> Result<()> {
    if profile.enabled {
        Ok(())
    } else {
        Err(CoreError::ProfileDisabled {
            profile_id: profile.id.clone(),
        })
    }
}

/// Request timeout taken from the current engine configuration on every
/// listing.
fn request_timeout_source(config_provider: &Arc<dyn ConfigProvider>) -> TimeoutSource {
    let config_provider = Arc::clone(config_provider);
    Arc::new(move || config_provider.engine_config().request_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::config::{StaticConfigProvider, SyncEngineConfig};
    use std::time::Duration;

    #[test]
    fn test_request_timeout_follows_config_updates() {
        let static_provider = Arc::new(StaticConfigProvider::new(
            SyncEngineConfig::builder()
                .request_timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
        ));
        let provider: Arc<dyn ConfigProvider> = static_provider.clone();
        let source = request_timeout_source(&provider);
        assert_eq!(source(), Duration::from_secs(5));

        static_provider
            .update(
                SyncEngineConfig::builder()
                    .request_timeout(Duration::from_secs(12))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(source(), Duration::from_secs(12));
    }
}
