use bridge_traits::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Timeouts, resets and throttling. Retried with backoff by the lister.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Credentials rejected by the server. Never retried.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote path not found: {path}")]
    NotFound { path: String },

    /// Directory below the configured depth limit. The subtree is skipped.
    #[error("Scan depth {depth} exceeded at {path}")]
    ScanDepthExceeded { path: String, depth: usize },

    #[error("Unable to scan selected folders: {}", failed.join(", "))]
    AllFoldersFailed { failed: Vec<String> },

    #[error("Sync already in progress for profile {profile_id}")]
    SyncInProgress { profile_id: String },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl SyncError {
    /// Whether repeating the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::TransientNetwork(_))
    }

    /// Map a transport failure for `path` into the sync taxonomy.
    pub fn from_bridge(error: BridgeError, path: &str) -> Self {
        match error {
            BridgeError::Network(message) => SyncError::TransientNetwork(message),
            BridgeError::Io(e) => SyncError::TransientNetwork(e.to_string()),
            BridgeError::Unauthorized(message) => SyncError::Auth(message),
            BridgeError::NotFound(_) => SyncError::NotFound {
                path: path.to_string(),
            },
            other => SyncError::Provider(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
