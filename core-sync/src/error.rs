use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Playlist {playlist_id} not found")]
    NotFound { playlist_id: String },

    #[error("Sync already in progress for playlist {playlist_id}")]
    AlreadyInProgress { playlist_id: String },

    /// Metadata or track listing could not be fetched from the catalog
    #[error("Failed to fetch {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: BridgeError,
    },

    /// The catalog handed back a cursor it had already returned
    #[error("Track listing repeated pagination cursor {cursor}")]
    PaginationLoop { cursor: String },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    #[error("Download tool exited with code {}", .code.map_or_else(|| "unknown".to_string(), |c| c.to_string()))]
    ProcessExit { code: Option<i32> },

    #[error("Failed to start download tool: {message}")]
    Spawn { message: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
