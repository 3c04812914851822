//! WebDAV transport
//!
//! Implements [`RemoteTransport`] with a single `PROPFIND` (`Depth: 1`) per
//! listing. Retries belong to the engine, so every call is one attempt.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::remote::{ConnectionProfile, RemoteEntry, RemoteTransport};
use bridge_traits::storage::SecureStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{Result, WebDavError};
use crate::propfind::{parse_multistatus, DavResource, PROPFIND_ALLPROP};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of an error body kept in [`WebDavError::Http`].
const ERROR_BODY_PREVIEW: usize = 200;

/// Supplies the timeout for the next request.
pub type TimeoutSource = Arc<dyn Fn() -> Duration + Send + Sync>;

/// Resolved password. Lives only for the duration of one request.
struct Password(String);

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// WebDAV implementation of [`RemoteTransport`]
///
/// # Example
///
/// ```ignore
/// use provider_webdav::WebDavTransport;
///
/// let transport = WebDavTransport::new(http_client, secure_store)
///     .with_request_timeout(Duration::from_secs(10));
/// let entries = transport.list_directory(&profile, "/Music").await?;
/// ```
pub struct WebDavTransport {
    http_client: Arc<dyn HttpClient>,
    secure_store: Arc<dyn SecureStore>,
    request_timeout: TimeoutSource,
}

impl WebDavTransport {
    pub fn new(http_client: Arc<dyn HttpClient>, secure_store: Arc<dyn SecureStore>) -> Self {
        Self {
            http_client,
            secure_store,
            request_timeout: Arc::new(|| DEFAULT_REQUEST_TIMEOUT),
        }
    }

    pub fn with_request_timeout(self, timeout: Duration) -> Self {
        self.with_request_timeout_source(Arc::new(move || timeout))
    }

    /// Read the timeout from `source` before every request, so a changed
    /// setting applies to the next listing.
    pub fn with_request_timeout_source(mut self, source: TimeoutSource) -> Self {
        self.request_timeout = source;
        self
    }

    /// Build the request URL for `path` below `base_url`.
    ///
    /// Absolute `http(s)://` paths are used verbatim. Every other path is
    /// appended segment by segment, percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`WebDavError::InvalidUrl`] if `base_url` is not an HTTP URL.
    pub fn build_url(base_url: &str, path: &str) -> Result<String> {
        if is_http_url(path) {
            return Ok(path.to_string());
        }

        let base = base_url.trim().trim_end_matches('/');
        if !is_http_url(base) {
            return Err(WebDavError::InvalidUrl(base_url.to_string()));
        }

        let relative = path.trim().trim_start_matches('/');
        if relative.is_empty() {
            return Ok(format!("{}/", base));
        }

        let encoded = relative
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Ok(format!("{}/{}", base, encoded))
    }

    async fn resolve_password(&self, profile: &ConnectionProfile) -> Result<Password> {
        let secret = self
            .secure_store
            .get_secret(profile.credential.secure_store_key())
            .await?
            .ok_or_else(|| {
                WebDavError::Credential(format!("no secret stored for profile {}", profile.id))
            })?;

        String::from_utf8(secret).map(Password).map_err(|_| {
            WebDavError::Credential(format!("secret for profile {} is not UTF-8", profile.id))
        })
    }

    async fn propfind(&self, profile: &ConnectionProfile, path: &str) -> Result<Vec<DavResource>> {
        let url = Self::build_url(&profile.base_url, path)?;
        let password = self.resolve_password(profile).await?;

        let request = HttpRequest::new(HttpMethod::Propfind, url)
            .header("Depth", "1")
            .basic_auth(&profile.username, &password.0)
            .xml_body(PROPFIND_ALLPROP)
            .timeout((self.request_timeout)());
        drop(password);

        let response = self.http_client.execute(request).await?;
        check_status(&response, path)?;

        let body = response.text()?;
        parse_multistatus(&body)
    }
}

#[async_trait]
impl RemoteTransport for WebDavTransport {
    #[instrument(skip(self, profile), fields(profile_id = %profile.id))]
    async fn list_directory(
        &self,
        profile: &ConnectionProfile,
        path: &str,
    ) -> BridgeResult<Vec<RemoteEntry>> {
        let resources = self.propfind(profile, path).await?;

        let entries: Vec<RemoteEntry> = resources
            .iter()
            .map(|resource| entry_from_resource(path, resource))
            .collect();

        debug!(entries = entries.len(), "Listed remote directory");
        Ok(entries)
    }
}

fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn check_status(response: &HttpResponse, path: &str) -> Result<()> {
    match response.status {
        200 | 207 => Ok(()),
        401 | 403 => Err(WebDavError::Unauthorized {
            status: response.status,
        }),
        404 => Err(WebDavError::NotFound {
            path: path.to_string(),
        }),
        408 | 429 | 500..=599 => Err(WebDavError::Network(format!(
            "server answered {} for {}",
            response.status, path
        ))),
        status => Err(WebDavError::Http {
            status,
            message: String::from_utf8_lossy(&response.body)
                .chars()
                .take(ERROR_BODY_PREVIEW)
                .collect(),
        }),
    }
}

/// Map one multistatus resource to an entry below `current_path`.
fn entry_from_resource(current_path: &str, resource: &DavResource) -> RemoteEntry {
    let name = resource.name();
    let parent = current_path.trim().trim_end_matches('/');

    let mut path = if parent.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    };
    if resource.is_collection && !path.ends_with('/') {
        path.push('/');
    }

    RemoteEntry {
        name,
        path,
        is_directory: resource.is_collection,
        size: resource.content_length.unwrap_or(0),
        last_modified: resource.last_modified,
        content_type: resource.content_type.clone(),
    }
}
