//! # File Reconciler
//!
//! Marks each track Downloaded or Pending by matching its key against the
//! audio files sitting directly in the playlist's mirror directory.
//!
//! A track counts as downloaded when some file key *contains* the track key.
//! The download tool often decorates file names (`... (320kbps).mp3`), so
//! exact equality would miss most files. Tracks whose key is empty never
//! match.

use crate::models::{LocalStatus, Playlist, Track};
use crate::normalize::normalize;
use crate::registry::{PlaylistEntry, WriterGuard};
use crate::{Result, SyncError};
use bridge_traits::storage::FileSystemAccess;
use core_runtime::config::DEFAULT_AUDIO_EXTENSIONS;
use core_runtime::events::{CoreEvent, EventBus, PlaylistEvent};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileStats {
    pub tracks: usize,
    pub downloaded: usize,
    /// Audio files found in the mirror directory
    pub local_files: usize,
}

impl ReconcileStats {
    pub fn pending(&self) -> usize {
        self.tracks - self.downloaded
    }
}

pub struct Reconciler {
    fs: Arc<dyn FileSystemAccess>,
    audio_extensions: HashSet<String>,
    event_bus: Option<EventBus>,
}

impl Reconciler {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            fs,
            audio_extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            event_bus: None,
        }
    }

    /// Extensions are matched case-insensitively, with or without a leading dot
    pub fn with_audio_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.audio_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Reconcile one playlist against its mirror directory
    #[instrument(skip(self, entry), fields(playlist_id = %entry.id()))]
    pub async fn reconcile(&self, entry: &PlaylistEntry) -> Result<ReconcileStats> {
        let writer = entry.lock_writer().await;
        self.reconcile_locked(entry, &writer).await
    }

    /// Same as [`reconcile`](Self::reconcile) for callers already holding
    /// the entry's writer lock
    pub(crate) async fn reconcile_locked(
        &self,
        entry: &PlaylistEntry,
        _writer: &WriterGuard<'_>,
    ) -> Result<ReconcileStats> {
        let download_dir = entry.read().await.download_dir.clone();
        let file_keys = self.local_file_keys(&download_dir).await?;

        let stats = {
            let mut playlist = entry.write().await;
            apply_file_keys(&mut playlist, &file_keys)
        };

        debug!(
            tracks = stats.tracks,
            downloaded = stats.downloaded,
            local_files = stats.local_files,
            "Reconciled playlist"
        );

        if let Some(bus) = &self.event_bus {
            let tracks_total = entry.read().await.tracks_total;
            let _ = bus.emit(CoreEvent::Playlist(PlaylistEvent::Reconciled {
                playlist_id: entry.id().to_string(),
                downloaded: stats.downloaded as u64,
                tracks_total,
            }));
        }

        Ok(stats)
    }

    /// Normalised stems of the audio files directly inside `dir`
    async fn local_file_keys(&self, dir: &Path) -> Result<Vec<String>> {
        let paths = match self.fs.list_files(dir).await {
            Ok(paths) => paths,
            Err(e) if e.is_not_found() => {
                debug!(path = ?dir, "Mirror directory missing, treating as empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(SyncError::Filesystem {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        Ok(paths
            .iter()
            .filter(|path| self.is_audio_file(path))
            .filter_map(|path| path.file_stem())
            .map(|stem| normalize(&stem.to_string_lossy()))
            .collect())
    }

    fn is_audio_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                self.audio_extensions
                    .contains(&ext.to_string_lossy().to_lowercase())
            })
            .unwrap_or(false)
    }
}

/// Re-status every track and recompute the aggregates
fn apply_file_keys(playlist: &mut Playlist, file_keys: &[String]) -> ReconcileStats {
    let downloaded = mark_tracks(&mut playlist.tracks, file_keys);

    playlist.downloaded_count = downloaded as u64;
    if playlist.tracks_total == 0 {
        playlist.tracks_total = playlist.tracks.len() as u64;
    }

    ReconcileStats {
        tracks: playlist.tracks.len(),
        downloaded,
        local_files: file_keys.len(),
    }
}

/// Returns how many tracks ended up Downloaded
pub fn mark_tracks(tracks: &mut [Track], file_keys: &[String]) -> usize {
    let mut downloaded = 0;
    for track in tracks.iter_mut() {
        let found =
            !track.key.is_empty() && file_keys.iter().any(|file| file.contains(&track.key));
        track.local_status = if found {
            downloaded += 1;
            LocalStatus::Downloaded
        } else {
            LocalStatus::Pending
        };
    }
    downloaded
}
