//! # Remote File Lister
//!
//! Lists the direct children of one remote directory on top of a
//! [`RemoteTransport`], adding the retry policy the transport leaves out.
//!
//! - The first entry of a raw listing describes the directory itself and is
//!   dropped.
//! - Transient failures are retried up to `max_attempts` with exponential
//!   backoff from [`RetrySettings`].
//! - Authentication and not-found failures surface immediately.

use crate::paths::normalize_folder_path;
use crate::{Result, SyncError};
use bridge_traits::{ConnectionProfile, RemoteEntry, RemoteTransport};
use core_runtime::config::RetrySettings;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct RemoteFileLister {
    transport: Arc<dyn RemoteTransport>,
    retry: RetrySettings,
}

impl RemoteFileLister {
    pub fn new(transport: Arc<dyn RemoteTransport>, retry: RetrySettings) -> Self {
        Self { transport, retry }
    }

    /// List the children of `path`, excluding the directory-self entry.
    ///
    /// # Errors
    ///
    /// - [`SyncError::TransientNetwork`] once every attempt has failed
    /// - [`SyncError::Auth`] when the server rejects the credentials
    /// - [`SyncError::NotFound`] when the directory does not exist
    #[instrument(skip(self, profile), fields(profile_id = %profile.id))]
    pub async fn list(&self, profile: &ConnectionProfile, path: &str) -> Result<Vec<RemoteEntry>> {
        let path = normalize_folder_path(path);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.transport.list_directory(profile, &path).await {
                Ok(entries) => {
                    let children: Vec<RemoteEntry> = entries.into_iter().skip(1).collect();
                    debug!(path = %path, count = children.len(), "Listed remote directory");
                    return Ok(children);
                }
                Err(e) => {
                    let error = SyncError::from_bridge(e, &path);
                    if !error.is_retryable() || attempt >= max_attempts {
                        return Err(error);
                    }

                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        path = %path,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Listing failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
