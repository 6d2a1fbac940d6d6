//! # Playlist State
//!
//! In-memory model of one mirrored playlist: remote metadata, the flat track
//! list with per-track local presence, the download job status and the
//! captured tool output.
//!
//! ## Status Machine
//!
//! ```text
//!          start_job             exit 0
//!   Idle ───────────▶ Syncing ───────────▶ Idle
//!    ▲                 │   ▲
//!    │                 │   │ start_job
//!    │   exit != 0 /   ▼   │
//!    └ ─ ─ ─ ─ ─ ─  Error ─┘
//!        spawn failure
//! ```
//!
//! `Idle` and `Error` are resting states. `Syncing` is the only state with an
//! [`ActiveJob`].

use crate::log_buffer::{LogBuffer, LogLine};
use crate::normalize::track_key;
use crate::{Result, SyncError};
use bridge_traits::catalog::{RemoteImage, RemotePlaylist, RemoteTrack};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Name shown until the first successful refresh
pub const PLACEHOLDER_NAME: &str = "Loading...";

// ============================================================================
// Status Types
// ============================================================================

/// Download status of a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistStatus {
    /// No job running, last job (if any) succeeded
    #[default]
    Idle,
    /// The download tool is running
    Syncing,
    /// The last job failed or could not be started
    Error,
}

impl PlaylistStatus {
    /// Whether a job is running
    pub fn is_active(&self) -> bool {
        matches!(self, PlaylistStatus::Syncing)
    }

    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: PlaylistStatus) -> bool {
        use PlaylistStatus::*;
        matches!(
            (self, next),
            (Idle, Syncing) | (Error, Syncing) | (Syncing, Idle) | (Syncing, Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistStatus::Idle => "idle",
            PlaylistStatus::Syncing => "syncing",
            PlaylistStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for PlaylistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a track has a matching file in the mirror directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalStatus {
    #[default]
    Pending,
    Downloaded,
}

impl LocalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalStatus::Pending => "pending",
            LocalStatus::Downloaded => "downloaded",
        }
    }
}

impl std::fmt::Display for LocalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Track
// ============================================================================

/// One remote track plus its matching key and local presence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    /// Artist names joined with `", "`
    pub artists: String,
    pub album: String,
    pub external_url: Option<String>,
    pub duration_ms: u64,
    /// Normalised `"<artists> - <name>"`
    pub key: String,
    pub local_status: LocalStatus,
}

impl Track {
    pub fn is_downloaded(&self) -> bool {
        self.local_status == LocalStatus::Downloaded
    }
}

impl From<RemoteTrack> for Track {
    fn from(remote: RemoteTrack) -> Self {
        let artists = remote.artists.join(", ");
        let key = track_key(&artists, &remote.name);
        Self {
            id: remote.id,
            name: remote.name,
            artists,
            album: remote.album,
            external_url: remote.external_url,
            duration_ms: remote.duration_ms,
            key,
            local_status: LocalStatus::Pending,
        }
    }
}

// ============================================================================
// Active Job
// ============================================================================

/// The running download job, present only while `Syncing`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveJob {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Filled in once the launcher reports it
    pub pid: Option<u32>,
}

// ============================================================================
// Playlist
// ============================================================================

/// Full sync state of one playlist
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: String,
    pub url: String,
    pub name: String,
    pub owner: String,
    pub description: String,
    pub images: Vec<RemoteImage>,
    /// Provider order
    pub tracks: Vec<Track>,
    pub tracks_total: u64,
    pub downloaded_count: u64,
    pub status: PlaylistStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_metadata_refresh_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub download_dir: PathBuf,
    pub active_job: Option<ActiveJob>,
    pub logs: LogBuffer,
}

impl Playlist {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        download_dir: impl Into<PathBuf>,
        log_capacity: usize,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            name: PLACEHOLDER_NAME.to_string(),
            owner: String::new(),
            description: String::new(),
            images: Vec::new(),
            tracks: Vec::new(),
            tracks_total: 0,
            downloaded_count: 0,
            status: PlaylistStatus::Idle,
            last_sync_at: None,
            last_metadata_refresh_at: None,
            error_message: None,
            download_dir: download_dir.into(),
            active_job: None,
            logs: LogBuffer::new(log_capacity),
        }
    }

    /// Move to `next`, rejecting transitions the status machine forbids
    pub fn transition(&mut self, next: PlaylistStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Copy descriptive fields from a metadata fetch
    ///
    /// The stored url survives an empty remote url, and `tracks_total` only
    /// ever grows.
    pub fn apply_metadata(&mut self, remote: &RemotePlaylist) {
        self.name = remote.name.clone();
        self.owner = remote.owner.clone();
        self.description = remote.description.clone();
        self.images = remote.images.clone();
        if !remote.url.is_empty() {
            self.url = remote.url.clone();
        }
        self.tracks_total = self.tracks_total.max(remote.tracks_total);
    }

    /// Replace the track list wholesale; every track starts out Pending
    pub fn replace_tracks(&mut self, remote: Vec<RemoteTrack>) {
        self.tracks = remote.into_iter().map(Track::from).collect();
        self.downloaded_count = 0;
    }

    pub fn summary(&self) -> PlaylistSummary {
        PlaylistSummary {
            id: self.id.clone(),
            url: self.url.clone(),
            name: self.name.clone(),
            owner: self.owner.clone(),
            description: self.description.clone(),
            images: self.images.clone(),
            tracks_total: self.tracks_total,
            downloaded_count: self.downloaded_count,
            status: self.status,
            last_sync_at: self.last_sync_at,
            last_metadata_refresh_at: self.last_metadata_refresh_at,
        }
    }

    pub fn detail(&self) -> PlaylistDetail {
        PlaylistDetail {
            summary: self.summary(),
            error_message: self.error_message.clone(),
            job_active: self.active_job.is_some(),
        }
    }

    pub fn push_log(&mut self, line: LogLine) {
        self.logs.push(line);
    }
}

// ============================================================================
// Projections
// ============================================================================

/// Cheap read-only view for listings; no tracks, job or logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub url: String,
    pub name: String,
    pub owner: String,
    pub description: String,
    pub images: Vec<RemoteImage>,
    pub tracks_total: u64,
    pub downloaded_count: u64,
    pub status: PlaylistStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_metadata_refresh_at: Option<DateTime<Utc>>,
}

/// Summary plus the latest error, for a single-playlist view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub summary: PlaylistSummary,
    pub error_message: Option<String>,
    pub job_active: bool,
}
