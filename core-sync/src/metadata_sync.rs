//! # Metadata Sync
//!
//! Pulls playlist metadata and the complete track list from the catalog,
//! replaces the stored tracks and reconciles them against the mirror
//! directory.
//!
//! ## Failure Handling
//!
//! [`MetadataSync::refresh`] never returns an error. A failed fetch leaves
//! the current track list untouched, records the failure in
//! `error_message` and is reported as [`RefreshOutcome::Failed`]. Schedulers
//! can call it in a loop forever.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let sync = Arc::new(MetadataSync::new(source, reconciler));
//! let task = sync.spawn_refresh(entry);
//! // ... later, or never:
//! match task.wait().await {
//!     RefreshOutcome::Refreshed { tracks, .. } => println!("{} tracks", tracks),
//!     RefreshOutcome::Failed { message } => eprintln!("{}", message),
//! }
//! ```

use crate::reconciler::Reconciler;
use crate::registry::PlaylistEntry;
use crate::{Result, SyncError};
use bridge_traits::catalog::{PlaylistSource, RemotePlaylist, RemoteTrack};
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{CoreEvent, EventBus, PlaylistEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Outcome Types
// ============================================================================

/// How a refresh ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed {
        /// Tracks in the new list
        tracks: usize,
        /// Tracks matched to local files
        downloaded: usize,
    },
    Failed {
        message: String,
    },
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed { .. })
    }
}

/// Handle to a refresh running in the background
///
/// Dropping it does not cancel the refresh.
#[derive(Debug)]
pub struct RefreshTask {
    playlist_id: String,
    handle: JoinHandle<RefreshOutcome>,
}

impl RefreshTask {
    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the refresh to finish
    pub async fn wait(self) -> RefreshOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => RefreshOutcome::Failed {
                message: format!("Refresh task failed: {}", e),
            },
        }
    }
}

// ============================================================================
// Metadata Sync
// ============================================================================

pub struct MetadataSync {
    source: Arc<dyn PlaylistSource>,
    reconciler: Arc<Reconciler>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
}

impl MetadataSync {
    pub fn new(source: Arc<dyn PlaylistSource>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            source,
            reconciler,
            clock: Arc::new(SystemClock),
            event_bus: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Refresh in a background task
    pub fn spawn_refresh(self: &Arc<Self>, entry: Arc<PlaylistEntry>) -> RefreshTask {
        let sync = Arc::clone(self);
        let playlist_id = entry.id().to_string();
        let handle = tokio::spawn(async move { sync.refresh(&entry).await });
        RefreshTask {
            playlist_id,
            handle,
        }
    }

    /// Fetch metadata and tracks, replace the track list, reconcile
    #[instrument(skip(self, entry), fields(playlist_id = %entry.id()))]
    pub async fn refresh(&self, entry: &PlaylistEntry) -> RefreshOutcome {
        let writer = entry.lock_writer().await;

        let (remote, tracks) = match self.fetch(entry.id()).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Failed to refresh playlist metadata");
                entry.write().await.error_message = Some(message.clone());
                self.emit(PlaylistEvent::RefreshFailed {
                    playlist_id: entry.id().to_string(),
                    message: message.clone(),
                });
                return RefreshOutcome::Failed { message };
            }
        };

        let track_count = tracks.len();
        {
            let mut playlist = entry.write().await;
            playlist.apply_metadata(&remote);
            playlist.replace_tracks(tracks);
        }

        let reconciled = self.reconciler.reconcile_locked(entry, &writer).await;

        let mut playlist = entry.write().await;
        playlist.last_metadata_refresh_at = Some(self.clock.now());
        match reconciled {
            Ok(stats) => {
                playlist.error_message = None;
                drop(playlist);

                info!(
                    tracks = track_count,
                    downloaded = stats.downloaded,
                    "Refreshed playlist metadata"
                );
                self.emit(PlaylistEvent::MetadataRefreshed {
                    playlist_id: entry.id().to_string(),
                    tracks: track_count as u64,
                    downloaded: stats.downloaded as u64,
                });
                RefreshOutcome::Refreshed {
                    tracks: track_count,
                    downloaded: stats.downloaded,
                }
            }
            Err(e) => {
                // Tracks are new but their local status could not be computed
                let message = e.to_string();
                playlist.error_message = Some(message.clone());
                drop(playlist);

                warn!(error = %message, "Refreshed metadata but reconciliation failed");
                self.emit(PlaylistEvent::RefreshFailed {
                    playlist_id: entry.id().to_string(),
                    message: message.clone(),
                });
                RefreshOutcome::Failed { message }
            }
        }
    }

    async fn fetch(&self, playlist_id: &str) -> Result<(RemotePlaylist, Vec<RemoteTrack>)> {
        let remote = self
            .source
            .fetch_metadata(playlist_id)
            .await
            .map_err(|source| SyncError::Fetch {
                what: "playlist metadata",
                source,
            })?;
        let tracks = fetch_all_tracks(self.source.as_ref(), playlist_id).await?;
        Ok((remote, tracks))
    }

    fn emit(&self, event: PlaylistEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playlist(event));
        }
    }
}

/// Follow the pagination cursor until the catalog stops returning one
///
/// Pages are concatenated in the order received. A cursor that comes back a
/// second time aborts with [`SyncError::PaginationLoop`] instead of looping.
pub async fn fetch_all_tracks(
    source: &dyn PlaylistSource,
    playlist_id: &str,
) -> Result<Vec<RemoteTrack>> {
    let mut tracks = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source
            .fetch_tracks_page(playlist_id, cursor.clone())
            .await
            .map_err(|source| SyncError::Fetch {
                what: "playlist tracks",
                source,
            })?;
        pages += 1;
        tracks.extend(page.items);

        match page.next_cursor {
            Some(next) => {
                if !seen.insert(next.clone()) {
                    return Err(SyncError::PaginationLoop { cursor: next });
                }
                cursor = Some(next);
            }
            None => break,
        }
    }

    debug!(pages, tracks = tracks.len(), "Fetched complete track list");
    Ok(tracks)
}
