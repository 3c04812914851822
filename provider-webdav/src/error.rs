//! Error types for the WebDAV provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebDavError {
    /// Server answered with a status that has no better mapping
    #[error("WebDAV request failed (status {status}): {message}")]
    Http { status: u16, message: String },

    /// 401 or 403
    #[error("Server rejected credentials (status {status})")]
    Unauthorized { status: u16 },

    #[error("Remote path not found: {path}")]
    NotFound { path: String },

    /// Timeouts, throttling and 5xx answers
    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed multistatus response: {0}")]
    Xml(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The credential handle could not be resolved to a usable secret.
    /// Never carries the secret itself.
    #[error("Credential unavailable: {0}")]
    Credential(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, WebDavError>;

impl From<WebDavError> for BridgeError {
    fn from(error: WebDavError) -> Self {
        match error {
            WebDavError::Unauthorized { status } => {
                BridgeError::Unauthorized(format!("server answered {}", status))
            }
            WebDavError::Credential(msg) => BridgeError::Unauthorized(msg),
            WebDavError::NotFound { path } => BridgeError::NotFound(path),
            WebDavError::Network(msg) => BridgeError::Network(msg),
            WebDavError::Bridge(e) => e,
            other @ (WebDavError::Http { .. }
            | WebDavError::Xml(_)
            | WebDavError::InvalidUrl(_)) => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
