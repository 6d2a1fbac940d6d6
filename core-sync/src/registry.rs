//! # Playlist Registry
//!
//! Process-lifetime map from playlist id to its shared [`PlaylistEntry`].
//! One registry is built at startup and handed to every component by `Arc`.
//!
//! ## Locking
//!
//! Each entry has two locks:
//!
//! - `state`: an `RwLock` around the [`Playlist`]. Reads take it briefly;
//!   every mutation is a short write section with no I/O inside.
//! - `writer`: a `Mutex<()>` held for the whole of a refresh, a
//!   reconciliation, or a job-exit update, so those never interleave on the
//!   same playlist. Different playlists never contend.

use crate::log_buffer::LogLine;
use crate::models::{Playlist, PlaylistDetail, PlaylistSummary, Track};
use core_runtime::config::{MirrorConfig, DEFAULT_LOG_CAPACITY};
use core_runtime::events::{CoreEvent, EventBus, PlaylistEvent};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Proof that the caller holds an entry's writer lock
pub type WriterGuard<'a> = MutexGuard<'a, ()>;

// ============================================================================
// Entry
// ============================================================================

/// Shared handle to one playlist's state
#[derive(Debug)]
pub struct PlaylistEntry {
    id: String,
    state: RwLock<Playlist>,
    writer: Mutex<()>,
}

impl PlaylistEntry {
    pub fn new(playlist: Playlist) -> Self {
        Self {
            id: playlist.id.clone(),
            state: RwLock::new(playlist),
            writer: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Serialise with other refresh / reconcile / job-exit work on this playlist
    pub async fn lock_writer(&self) -> WriterGuard<'_> {
        self.writer.lock().await
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Playlist> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Playlist> {
        self.state.write().await
    }

    /// Point-in-time copy of the whole playlist
    pub async fn snapshot(&self) -> Playlist {
        self.state.read().await.clone()
    }

    pub async fn summary(&self) -> PlaylistSummary {
        self.state.read().await.summary()
    }

    pub async fn detail(&self) -> PlaylistDetail {
        self.state.read().await.detail()
    }

    pub async fn tracks(&self) -> Vec<Track> {
        self.state.read().await.tracks.clone()
    }

    pub async fn logs(&self) -> Vec<LogLine> {
        self.state.read().await.logs.to_vec()
    }

    pub async fn append_log(&self, line: LogLine) {
        self.state.write().await.push_log(line);
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Default)]
struct RegistryInner {
    /// Registration order
    order: Vec<String>,
    entries: HashMap<String, Arc<PlaylistEntry>>,
}

/// All known playlists, in registration order
#[derive(Debug)]
pub struct PlaylistRegistry {
    download_root: PathBuf,
    log_capacity: usize,
    inner: Mutex<RegistryInner>,
    event_bus: Option<EventBus>,
}

impl PlaylistRegistry {
    pub fn new(download_root: impl Into<PathBuf>) -> Self {
        Self {
            download_root: download_root.into(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            inner: Mutex::new(RegistryInner::default()),
            event_bus: None,
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(config.download_root.clone()).with_log_capacity(config.log_capacity)
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    /// Existing entry for `id`, or a fresh Idle one
    ///
    /// An existing entry is returned untouched; in particular its url is not
    /// replaced by `url`.
    pub async fn get_or_create(&self, id: &str, url: &str) -> Arc<PlaylistEntry> {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.entries.get(id) {
            debug!(playlist_id = id, "Playlist already registered");
            return Arc::clone(entry);
        }

        let playlist = Playlist::new(id, url, self.download_root.join(id), self.log_capacity);
        let entry = Arc::new(PlaylistEntry::new(playlist));
        inner.order.push(id.to_string());
        inner.entries.insert(id.to_string(), Arc::clone(&entry));
        drop(inner);

        info!(playlist_id = id, url, "Registered playlist");
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playlist(PlaylistEvent::Registered {
                playlist_id: id.to_string(),
                url: url.to_string(),
            }));
        }
        entry
    }

    pub async fn get(&self, id: &str) -> Option<Arc<PlaylistEntry>> {
        self.inner.lock().await.entries.get(id).cloned()
    }

    /// Every entry, in registration order
    pub async fn entries(&self) -> Vec<Arc<PlaylistEntry>> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.entries.get(id).cloned())
            .collect()
    }

    pub async fn list_summaries(&self) -> Vec<PlaylistSummary> {
        let mut summaries = Vec::new();
        for entry in self.entries().await {
            summaries.push(entry.summary().await);
        }
        summaries
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
