//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the sync engine crates:
//! - Logging and tracing bootstrap
//! - Engine configuration and the injected [`ConfigProvider`](config::ConfigProvider)
//! - Event bus for sync progress and cache changes

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
