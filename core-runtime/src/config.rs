//! # Engine Configuration
//!
//! Configuration for the remote song-sync engine.
//!
//! ## Overview
//!
//! Two layers live here:
//!
//! - [`SyncEngineConfig`]: the tunables the engine reads on every run
//!   (concurrency, depth, file classification, retry policy, inference
//!   heuristics). The engine never reads global state; it is handed an
//!   `Arc<dyn ConfigProvider>` and asks it for a snapshot at the start of a run.
//! - [`CoreConfig`]: the host bridges and paths needed to assemble a working
//!   engine (database path, HTTP client, secure store). The builder fails fast
//!   with actionable messages when a capability is missing.
//!
//! When the `desktop-shims` feature is enabled, desktop defaults for
//! `HttpClient` (reqwest) and `SecureStore` (OS keyring) are injected
//! automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, SyncEngineConfig};
//!
//! let engine = SyncEngineConfig::builder()
//!     .max_concurrent_listings(4)
//!     .max_depth(12)
//!     .build()?;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/songs.db")
//!     .engine_config(engine)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, SecureStore};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

// ============================================================================
// Engine tunables
// ============================================================================

pub const DEFAULT_MAX_CONCURRENT_LISTINGS: usize = 2;
pub const DEFAULT_MAX_DEPTH: usize = 20;
pub const DEFAULT_DELETE_BATCH_SIZE: usize = 300;

const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "m4a", "ogg", "wav", "aac", "opus", "wma", "m4b", "mp4a",
];
const DEFAULT_COVER_BASE_NAMES: &[&str] = &["cover", "album", "folder"];
const DEFAULT_COVER_EXTENSIONS: &[&str] = &["jpg", "png", "webp"];

const DEFAULT_GENERIC_FOLDER_NAMES: &[&str] = &[
    "music",
    "songs",
    "song",
    "audio",
    "audios",
    "download",
    "downloads",
    "cloud",
    "webdav",
    "album",
    "albums",
    "track",
    "tracks",
    "artist",
    "artists",
    "playlist",
    "playlists",
    "unknown",
    "unknown artist",
    "various artists",
    "cover",
    "lyrics",
    "lrc",
    "tmp",
    "temp",
];

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Directory walk and file classification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    /// Listings allowed in flight across one whole root scan.
    pub max_concurrent_listings: usize,
    /// Deepest directory level visited below a root (root is depth 0).
    pub max_depth: usize,
    /// Lowercase extensions classified as audio.
    pub audio_extensions: Vec<String>,
    /// Lowercase file stems recognised as cover art.
    pub cover_base_names: Vec<String>,
    /// Lowercase extensions recognised as cover art.
    pub cover_extensions: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_concurrent_listings: DEFAULT_MAX_CONCURRENT_LISTINGS,
            max_depth: DEFAULT_MAX_DEPTH,
            audio_extensions: owned(DEFAULT_AUDIO_EXTENSIONS),
            cover_base_names: owned(DEFAULT_COVER_BASE_NAMES),
            cover_extensions: owned(DEFAULT_COVER_EXTENSIONS),
        }
    }
}

/// Retry policy for transient listing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 1.0 gives linear (constant) backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

/// Knobs for filename based artist/title inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceSettings {
    /// Lowercase folder names that never identify an artist or album.
    pub generic_folder_names: Vec<String>,
    /// Minimum occurrences for the recurring-token artist heuristic.
    pub token_frequency_threshold: usize,
    pub max_artist_candidate_len: usize,
    pub max_album_candidate_len: usize,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            generic_folder_names: owned(DEFAULT_GENERIC_FOLDER_NAMES),
            token_frequency_threshold: 2,
            max_artist_candidate_len: 48,
            max_album_candidate_len: 80,
        }
    }
}

/// Snapshot of every engine tunable.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEngineConfig {
    pub scan: ScanSettings,
    pub retry: RetrySettings,
    pub inference: InferenceSettings,
    /// Paths per DELETE statement.
    pub delete_batch_size: usize,
    /// Per-listing connect/read timeout handed to the HTTP client.
    pub request_timeout: Duration,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            scan: ScanSettings::default(),
            retry: RetrySettings::default(),
            inference: InferenceSettings::default(),
            delete_batch_size: DEFAULT_DELETE_BATCH_SIZE,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SyncEngineConfig {
    pub fn builder() -> SyncEngineConfigBuilder {
        SyncEngineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.max_concurrent_listings == 0 {
            return Err(Error::Config(
                "max_concurrent_listings must be at least 1".to_string(),
            ));
        }

        if self.scan.audio_extensions.is_empty() {
            return Err(Error::Config(
                "At least one audio extension is required".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "Retry max_attempts must be at least 1".to_string(),
            ));
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config(
                "Retry backoff multiplier must be >= 1.0".to_string(),
            ));
        }

        if self.retry.base_delay > self.retry.max_delay {
            return Err(Error::Config(
                "Retry base delay cannot exceed max delay".to_string(),
            ));
        }

        if self.delete_batch_size == 0 {
            return Err(Error::Config(
                "delete_batch_size must be at least 1".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "request_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`SyncEngineConfig`]; unset values fall back to defaults.
#[derive(Debug, Default)]
pub struct SyncEngineConfigBuilder {
    scan: ScanSettings,
    retry: RetrySettings,
    inference: InferenceSettings,
    delete_batch_size: Option<usize>,
    request_timeout: Option<Duration>,
}

impl SyncEngineConfigBuilder {
    pub fn max_concurrent_listings(mut self, permits: usize) -> Self {
        self.scan.max_concurrent_listings = permits;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.scan.max_depth = depth;
        self
    }

    pub fn audio_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scan.audio_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn generic_folder_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inference.generic_folder_names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .collect();
        self
    }

    pub fn token_frequency_threshold(mut self, threshold: usize) -> Self {
        self.inference.token_frequency_threshold = threshold;
        self
    }

    pub fn delete_batch_size(mut self, size: usize) -> Self {
        self.delete_batch_size = Some(size);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<SyncEngineConfig> {
        let config = SyncEngineConfig {
            scan: self.scan,
            retry: self.retry,
            inference: self.inference,
            delete_batch_size: self.delete_batch_size.unwrap_or(DEFAULT_DELETE_BATCH_SIZE),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
        };
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Config provider
// ============================================================================

/// Source of engine configuration, injected into the engine.
///
/// Hosts that let users edit preferences implement this over their own
/// settings storage; the engine takes one snapshot per run.
pub trait ConfigProvider: Send + Sync {
    fn engine_config(&self) -> SyncEngineConfig;
}

/// Provider holding a replaceable in-memory snapshot.
#[derive(Debug, Default)]
pub struct StaticConfigProvider {
    config: RwLock<SyncEngineConfig>,
}

impl StaticConfigProvider {
    pub fn new(config: SyncEngineConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the snapshot used by subsequent runs.
    pub fn update(&self, config: SyncEngineConfig) -> Result<()> {
        config.validate()?;
        let mut guard = self
            .config
            .write()
            .map_err(|_| Error::Internal("config lock poisoned".to_string()))?;
        *guard = config;
        Ok(())
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn engine_config(&self) -> SyncEngineConfig {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

// ============================================================================
// Host wiring
// ============================================================================

/// Bridges and paths needed to assemble the engine.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite song cache
    pub database_path: PathBuf,

    /// HTTP client used by the WebDAV transport
    pub http_client: Arc<dyn HttpClient>,

    /// Resolves connection credential handles (required)
    pub secure_store: Arc<dyn SecureStore>,

    /// Engine tunables
    pub config_provider: Arc<dyn ConfigProvider>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("engine_config", &self.config_provider.engine_config())
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        self.config_provider.engine_config().validate()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(capability_missing(
        "SecureStore",
        "SecureStore implementation is required to resolve connection credentials. \
         Desktop: enable the 'desktop-shims' feature to use the default KeyringSecureStore. \
         Mobile: inject platform-native secure storage (Keychain/Keystore).",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: e.to_string(),
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "HttpClient implementation is required by the WebDAV transport. \
         Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
         Mobile: inject a platform-native HTTP adapter.",
    ))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    config_provider: Option<Arc<dyn ConfigProvider>>,
}

impl CoreConfigBuilder {
    /// Sets the path of the SQLite song cache.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().database_path("/path/to/songs.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the HTTP client. Defaults to reqwest under `desktop-shims`.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store (required unless `desktop-shims` is enabled).
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Uses a fixed engine configuration.
    pub fn engine_config(mut self, config: SyncEngineConfig) -> Self {
        self.config_provider = Some(Arc::new(StaticConfigProvider::new(config)));
        self
    }

    /// Uses a host supplied configuration provider.
    pub fn config_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.config_provider = Some(provider);
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let config_provider = self
            .config_provider
            .unwrap_or_else(|| Arc::new(StaticConfigProvider::default()));

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(config_provider.engine_config().request_timeout)?,
        };

        let config = CoreConfig {
            database_path,
            http_client,
            secure_store,
            config_provider,
        };

        config.validate()?;

        Ok(config)
    }
}
