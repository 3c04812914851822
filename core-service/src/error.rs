use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Profile {profile_id} is disabled")]
    ProfileDisabled { profile_id: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
