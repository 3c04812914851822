//! # Host Bridge Traits
//!
//! Collaborator contracts between the sync engine and the host that embeds it.
//!
//! ## Overview
//!
//! The sync engine never talks to sockets, keychains or clocks directly. Every
//! capability it needs is expressed here as a `Send + Sync` trait that the host
//! (or one of the bundled adapter crates) implements.
//!
//! ## Traits
//!
//! ### Remote access
//! - [`RemoteTransport`](remote::RemoteTransport) - Lists one remote directory
//! - [`HttpClient`](http::HttpClient) - Single-attempt async HTTP used by transports
//!
//! ### Security
//! - [`SecureStore`](storage::SecureStore) - Resolves opaque credential handles
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Adapters
//!
//! | Capability        | Implementation                          |
//! |-------------------|-----------------------------------------|
//! | `HttpClient`      | `bridge-desktop::ReqwestHttpClient`     |
//! | `SecureStore`     | `bridge-desktop::KeyringSecureStore`    |
//! | `RemoteTransport` | `provider-webdav::WebDavTransport`      |
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Adapters map
//! their native failures onto it so the engine can tell transient network
//! failures (retried) from authentication and missing-path failures (surfaced
//! immediately).
//!
//! ## Credentials
//!
//! A [`ConnectionProfile`](remote::ConnectionProfile) only carries a
//! [`CredentialHandle`](remote::CredentialHandle). Turning that handle into a
//! secret is the transport's business; the handle's `Debug` output is redacted
//! and it cannot be serialized.

pub mod error;
pub mod http;
pub mod remote;
pub mod storage;
pub mod time;

pub use error::{BridgeError, Result};

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use remote::{ConnectionProfile, CredentialHandle, RemoteEntry, RemoteTransport};
pub use storage::SecureStore;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
