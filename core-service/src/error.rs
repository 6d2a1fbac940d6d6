use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Not a playlist url, uri or id: {0:?}")]
    InvalidPlaylistUrl(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),
}

impl ServiceError {
    /// Whether the error names a playlist the registry does not know
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Sync(core_sync::SyncError::NotFound { .. }))
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
