//! Remote server access.
//!
//! A [`RemoteTransport`] is the only primitive the sync engine needs from a
//! server: list the direct children of one directory. Everything above that
//! (retry, recursion, diffing) lives in the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Opaque reference to a secret held by a [`SecureStore`](crate::storage::SecureStore).
///
/// The engine never inspects it. `Debug` is redacted and the type is
/// deliberately not `Serialize`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialHandle(String);

impl CredentialHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key under which the secret is stored. Only transports should call this.
    pub fn secure_store_key(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialHandle([REDACTED])")
    }
}

/// One configured server connection.
///
/// Owned by the host's persistence layer; read-only to the sync engine.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub id: String,
    pub base_url: String,
    pub username: String,
    pub credential: CredentialHandle,
    /// Server-side directories selected as scan roots.
    pub root_folders: Vec<String>,
    pub enabled: bool,
    /// Epoch milliseconds of the last completed run.
    pub last_synced: Option<i64>,
}

impl ConnectionProfile {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        username: impl Into<String>,
        credential: CredentialHandle,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            username: username.into(),
            credential,
            root_folders: Vec::new(),
            enabled: true,
            last_synced: None,
        }
    }

    pub fn with_root_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.root_folders = folders.into_iter().map(Into::into).collect();
        self
    }
}

/// One node of a remote directory listing. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    /// Full server path; directories end with `/`.
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    /// Epoch milliseconds.
    pub last_modified: Option<i64>,
    pub content_type: Option<String>,
}

impl RemoteEntry {
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            name,
            path,
            is_directory: false,
            size,
            last_modified: None,
            content_type: None,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        let mut entry = Self::file(path, 0);
        if !entry.path.ends_with('/') {
            entry.path.push('/');
        }
        entry.is_directory = true;
        entry
    }

    pub fn with_last_modified(mut self, millis: i64) -> Self {
        self.last_modified = Some(millis);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Lists the children of a single remote directory.
///
/// The raw listing may start with an entry describing the directory itself;
/// callers are expected to drop it. Implementations perform exactly one
/// attempt and report failures as:
/// - [`BridgeError::Network`](crate::BridgeError::Network) for transient failures
/// - [`BridgeError::Unauthorized`](crate::BridgeError::Unauthorized) for rejected credentials
/// - [`BridgeError::NotFound`](crate::BridgeError::NotFound) for missing paths
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn list_directory(
        &self,
        profile: &ConnectionProfile,
        path: &str,
    ) -> Result<Vec<RemoteEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_handle_debug_is_redacted() {
        let profile = ConnectionProfile::new(
            "p1",
            "https://dav.example.com",
            "alice",
            CredentialHandle::new("webdav/p1/password"),
        );

        let rendered = format!("{:?}", profile);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("webdav/p1/password"));
    }

    #[test]
    fn test_entry_constructors() {
        let file = RemoteEntry::file("/Music/A.mp3", 42).with_content_type("audio/mpeg");
        assert_eq!(file.name, "A.mp3");
        assert!(!file.is_directory);
        assert_eq!(file.content_type.as_deref(), Some("audio/mpeg"));

        let dir = RemoteEntry::directory("/Music/Album");
        assert_eq!(dir.name, "Album");
        assert_eq!(dir.path, "/Music/Album/");
        assert!(dir.is_directory);
    }
}
