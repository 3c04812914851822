use thiserror::Error;

/// Errors raised while assembling or configuring the runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration; the message names the offending setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host bridge was not injected and no default exists.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
