//! Service wiring tests
//!
//! Bootstraps a `SyncService` from a `CoreConfig` backed by an in-process
//! WebDAV responder and a SQLite file in a temporary directory.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    ConnectionProfile, CredentialHandle, HttpClient, HttpMethod, HttpRequest,
    HttpResponse, SecureStore,
};
use bytes::Bytes;
use core_runtime::config::CoreConfig;
use core_service::{CoreError, SyncService};
use core_sync::SyncError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const BASE_URL: &str = "https://dav.test";

// ============================================================================
// Fakes
// ============================================================================

/// Answers PROPFIND from canned multistatus bodies keyed by path.
struct FakeDavServer {
    listings: HashMap<String, String>,
}

impl FakeDavServer {
    fn library() -> Self {
        let mut listings = HashMap::new();
        listings.insert(
            "/Music".to_string(),
            multistatus("/Music/", &[("/Music/Adele/", true)]),
        );
        listings.insert(
            "/Music/Adele".to_string(),
            multistatus(
                "/Music/Adele/",
                &[
                    ("/Music/Adele/Adele%20-%20Hello.mp3", false),
                    ("/Music/Adele/notes.txt", false),
                ],
            ),
        );
        Self { listings }
    }
}

fn multistatus(self_href: &str, children: &[(&str, bool)]) -> String {
    let response = |href: &str, collection: bool| {
        let props = if collection {
            "<d:resourcetype><d:collection/></d:resourcetype>".to_string()
        } else {
            "<d:resourcetype/><d:getcontentlength>2048</d:getcontentlength>\
             <d:getlastmodified>Mon, 01 Jan 2024 00:00:00 GMT</d:getlastmodified>"
                .to_string()
        };
        format!("<d:response><d:href>{href}</d:href><d:propstat><d:prop>{props}</d:prop></d:propstat></d:response>")
    };

    let mut body = String::from(r#"<?xml version="1.0"?><d:multistatus xmlns:d="DAV:">"#);
    body.push_str(&response(self_href, true));
    for (href, collection) in children {
        body.push_str(&response(href, *collection));
    }
    body.push_str("</d:multistatus>");
    body
}

#[async_trait]
impl HttpClient for FakeDavServer {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        assert_eq!(request.method, HttpMethod::Propfind);
        assert!(request.headers.contains_key("Authorization"));

        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .trim_end_matches('/');

        let (status, body) = match self.listings.get(path) {
            Some(body) => (207, body.clone()),
            None => (404, String::new()),
        };

        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body),
        })
    }
}

#[derive(Default)]
struct MemorySecureStore {
    secrets: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.secrets
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.secrets.lock().unwrap().get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.secrets.lock().unwrap().remove(key);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn profile() -> ConnectionProfile {
    ConnectionProfile::new("nas", BASE_URL, "alice", CredentialHandle::new("webdav/nas"))
        .with_root_folders(["/Music"])
}

async fn bootstrap(with_secret: bool) -> (SyncService, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemorySecureStore::default());
    if with_secret {
        store.set_secret("webdav/nas", b"secret").await.unwrap();
    }

    let config = CoreConfig::builder()
        .database_path(dir.path().join("songs.db"))
        .http_client(Arc::new(FakeDavServer::library()))
        .secure_store(store)
        .build()
        .unwrap();

    let service = SyncService::bootstrap(config).await.unwrap();
    (service, dir)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_sync_end_to_end() {
    let (service, _dir) = bootstrap(true).await;

    let outcome = service.sync(&profile()).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.upserted, 1);

    let songs = service.cached_songs("nas").await.unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].remote_path, "/Music/Adele/Adele - Hello.mp3");
    assert_eq!(songs[0].title, "Hello");
    assert_eq!(songs[0].artist, "Adele");
    assert_eq!(songs[0].file_size, 2048);

    assert!(service.last_synced("nas").await.unwrap().is_some());
    assert!(service.failed_folders("nas").await.unwrap().is_empty());
    assert!(!service.is_syncing("nas"));
}

#[tokio::test]
async fn test_second_run_leaves_cache_unchanged() {
    let (service, _dir) = bootstrap(true).await;

    service.sync(&profile()).await.unwrap();
    let second = service.sync(&profile()).await.unwrap();

    assert_eq!(second.upserted, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(second.total_deleted(), 0);
}

#[tokio::test]
async fn test_missing_secret_fails_every_folder() {
    let (service, _dir) = bootstrap(false).await;

    let result = service.sync(&profile()).await;
    assert!(matches!(
        result,
        Err(CoreError::Sync(SyncError::AllFoldersFailed { .. }))
    ));
    assert_eq!(
        service.failed_folders("nas").await.unwrap(),
        vec!["/Music".to_string()]
    );
}

#[tokio::test]
async fn test_disabled_profile_is_rejected() {
    let (service, _dir) = bootstrap(true).await;
    let mut disabled = profile();
    disabled.enabled = false;

    let result = service.sync(&disabled).await;
    assert!(matches!(result, Err(CoreError::ProfileDisabled { profile_id }) if profile_id == "nas"));

    let result = service.retry_failed_folders(&disabled).await;
    assert!(matches!(result, Err(CoreError::ProfileDisabled { .. })));
}

#[tokio::test]
async fn test_clear_profile_drops_cached_songs() {
    let (service, _dir) = bootstrap(true).await;
    service.sync(&profile()).await.unwrap();

    let removed = service.clear_profile("nas").await.unwrap();
    assert_eq!(removed, 1);
    assert!(service.cached_songs("nas").await.unwrap().is_empty());
}
