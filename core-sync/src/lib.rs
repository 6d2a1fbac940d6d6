//! # Playlist Sync Core
//!
//! Keeps an in-memory mirror state for a set of remote playlists and drives
//! the external download tool that fills each playlist's local directory.
//!
//! ## Components
//!
//! - **Registry** (`registry`): id → [`PlaylistEntry`], with per-playlist locking
//! - **Metadata Sync** (`metadata_sync`): fetches metadata and the paginated track list
//! - **File Reconciler** (`reconciler`): matches tracks to downloaded files
//! - **Job Manager** (`job`): one download tool run per playlist at a time
//! - **Models** (`models`): playlist/track state and the status machine
//! - **Normalisation** (`normalize`): the matching key shared by tracks and files
//! - **Log Buffer** (`log_buffer`): bounded capture of tool output
//!
//! Nothing here touches the network, the disk or child processes directly;
//! all of that goes through the `bridge-traits` capabilities handed in at
//! construction.

pub mod error;
pub mod job;
pub mod log_buffer;
pub mod metadata_sync;
pub mod models;
pub mod normalize;
pub mod reconciler;
pub mod registry;

pub use error::{Result, SyncError};
pub use job::{JobManager, JobOutcome, JobTicket};
pub use log_buffer::{LogBuffer, LogLine};
pub use metadata_sync::{fetch_all_tracks, MetadataSync, RefreshOutcome, RefreshTask};
pub use models::{
    ActiveJob, LocalStatus, Playlist, PlaylistDetail, PlaylistStatus, PlaylistSummary, Track,
};
pub use normalize::{normalize, track_key};
pub use reconciler::{ReconcileStats, Reconciler};
pub use registry::{PlaylistEntry, PlaylistRegistry};
