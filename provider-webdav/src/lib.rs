//! # WebDAV Provider
//!
//! [`RemoteTransport`](bridge_traits::RemoteTransport) for WebDAV servers
//! (Nextcloud, ownCloud, Apache `mod_dav`, nginx, ...).
//!
//! ## Overview
//!
//! - One `PROPFIND` with `Depth: 1` per directory listing
//! - Basic authentication from a secret resolved through
//!   [`SecureStore`](bridge_traits::SecureStore)
//! - Multistatus parsing with `quick-xml`
//! - Status codes mapped onto the bridge error taxonomy so the engine can tell
//!   transient failures from rejected credentials and missing paths

pub mod client;
pub mod error;
pub mod propfind;

pub use client::{TimeoutSource, WebDavTransport, DEFAULT_REQUEST_TIMEOUT};
pub use error::{Result, WebDavError};
pub use propfind::{parse_multistatus, DavResource};
