//! Integration tests for the mirror service façade and scheduler

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::catalog::{PlaylistSource, RemotePlaylist, RemoteTrack, TrackPage};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::process::{
    OutputStream, ProcessCommand, ProcessExit, ProcessHandle, ProcessLauncher, ProcessReporter,
};
use bridge_traits::storage::{FileMetadata, FileSystemAccess};
use core_runtime::config::MirrorConfig;
use core_service::{MirrorDependencies, MirrorScheduler, MirrorService, ServiceError};
use core_sync::{PlaylistStatus, SyncError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Fakes
// ============================================================================

/// One page per playlist; ids listed in `broken` fail
#[derive(Default)]
struct FakeCatalog {
    tracks: HashMap<String, Vec<RemoteTrack>>,
    broken: Vec<String>,
    metadata_calls: AtomicUsize,
}

impl FakeCatalog {
    fn with_playlist(mut self, id: &str, tracks: &[(&str, &str)]) -> Self {
        self.tracks.insert(
            id.to_string(),
            tracks
                .iter()
                .map(|(artist, name)| RemoteTrack {
                    id: format!("{}-{}", artist, name),
                    name: name.to_string(),
                    artists: vec![artist.to_string()],
                    ..Default::default()
                })
                .collect(),
        );
        self
    }
}

#[async_trait]
impl PlaylistSource for FakeCatalog {
    async fn fetch_metadata(&self, playlist_id: &str) -> BridgeResult<RemotePlaylist> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.iter().any(|b| b == playlist_id) {
            return Err(BridgeError::OperationFailed("Spotify API error 500: oops".to_string()));
        }
        Ok(RemotePlaylist {
            name: format!("Playlist {}", playlist_id),
            owner: "Owner".to_string(),
            tracks_total: self.tracks.get(playlist_id).map_or(0, |t| t.len() as u64),
            ..Default::default()
        })
    }

    async fn fetch_tracks_page(
        &self,
        playlist_id: &str,
        _cursor: Option<String>,
    ) -> BridgeResult<TrackPage> {
        Ok(TrackPage {
            items: self.tracks.get(playlist_id).cloned().unwrap_or_default(),
            next_cursor: None,
        })
    }
}

/// Prints one line and exits with `code` immediately
struct InstantLauncher {
    code: i32,
    launched: Mutex<Vec<ProcessCommand>>,
}

impl InstantLauncher {
    fn new(code: i32) -> Self {
        Self {
            code,
            launched: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProcessLauncher for InstantLauncher {
    async fn launch(&self, command: ProcessCommand) -> ProcessHandle {
        self.launched.lock().unwrap().push(command);
        let (reporter, handle) = ProcessReporter::channel(Some(7));
        reporter.emit(OutputStream::Stdout, "Found 2 songs");
        reporter.finish(ProcessExit::Exited {
            code: Some(self.code),
        });
        handle
    }
}

/// Filesystem with no files and no blocking I/O
struct EmptyFs;

#[async_trait]
impl FileSystemAccess for EmptyFs {
    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        Err(BridgeError::OperationFailed(format!("{} missing", path.display())))
    }

    async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
        Ok(())
    }

    async fn list_directory(&self, _path: &Path) -> BridgeResult<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn config(root: &Path, urls: &[&str]) -> MirrorConfig {
    MirrorConfig::builder()
        .download_root(root)
        .playlist_urls(urls.iter().copied())
        .downloader_args(["--output", "{artist} - {title}"])
        .build()
        .unwrap()
}

fn service(config: MirrorConfig, catalog: FakeCatalog, launcher: InstantLauncher) -> MirrorService {
    let deps = MirrorDependencies::new(
        Arc::new(catalog),
        Arc::new(TokioFileSystem::new()),
        Arc::new(launcher),
    );
    MirrorService::new(config, deps).unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_register_configured_playlists_refreshes_each() {
    let root = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default()
        .with_playlist("aaa111", &[("A", "One"), ("B", "Two")])
        .with_playlist("bbb222", &[("C", "Three")]);
    let svc = service(
        config(
            root.path(),
            &[
                "https://open.spotify.com/playlist/aaa111?si=xyz",
                "spotify:playlist:bbb222",
            ],
        ),
        catalog,
        InstantLauncher::new(0),
    );

    let tasks = svc.register_configured_playlists().await;
    assert_eq!(tasks.len(), 2);
    for task in tasks {
        assert!(task.wait().await.is_success());
    }

    let summaries = svc.list_summaries().await;
    let ids: Vec<_> = summaries.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["aaa111", "bbb222"]);
    assert_eq!(summaries[0].name, "Playlist aaa111");
    assert_eq!(summaries[0].tracks_total, 2);
    assert_eq!(svc.tracks("bbb222").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_lookups_of_unknown_playlist() {
    let root = tempfile::tempdir().unwrap();
    let svc = service(config(root.path(), &[]), FakeCatalog::default(), InstantLauncher::new(0));

    assert!(svc.get("nope").await.is_none());
    assert!(svc.playlist_detail("nope").await.unwrap_err().is_not_found());
    assert!(svc.logs("nope").await.unwrap_err().is_not_found());
    assert!(svc.refresh("nope").await.unwrap_err().is_not_found());
    assert!(matches!(
        svc.start_job("nope").await.unwrap_err(),
        ServiceError::Sync(SyncError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_start_job_through_service() {
    let root = tempfile::tempdir().unwrap();
    let svc = service(config(root.path(), &[]), FakeCatalog::default(), InstantLauncher::new(0));
    svc.get_or_create("abc", "https://open.spotify.com/playlist/abc").await;

    let ticket = svc.start_job("abc").await.unwrap();
    assert!(ticket.wait().await.is_success());

    let detail = svc.playlist_detail("abc").await.unwrap();
    assert_eq!(detail.summary.status, PlaylistStatus::Idle);
    assert!(detail.summary.last_sync_at.is_some());
    assert!(!detail.job_active);

    let logs = svc.logs("abc").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].text, "Found 2 songs");
}

#[tokio::test]
async fn test_job_failure_visible_in_detail() {
    let root = tempfile::tempdir().unwrap();
    let svc = service(config(root.path(), &[]), FakeCatalog::default(), InstantLauncher::new(2));
    svc.get_or_create("abc", "u").await;

    svc.start_job("abc").await.unwrap().wait().await;

    let detail = svc.playlist_detail("abc").await.unwrap();
    assert_eq!(detail.summary.status, PlaylistStatus::Error);
    assert_eq!(
        detail.error_message.as_deref(),
        Some("Download tool exited with code 2")
    );
}

#[tokio::test]
async fn test_refresh_all_isolates_failures() {
    let root = tempfile::tempdir().unwrap();
    let mut catalog = FakeCatalog::default().with_playlist("good", &[("A", "One")]);
    catalog.broken.push("bad".to_string());
    let svc = service(config(root.path(), &[]), catalog, InstantLauncher::new(0));
    svc.get_or_create("good", "u1").await;
    svc.get_or_create("bad", "u2").await;

    let outcomes = svc.refresh_all().await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].1.is_success());
    assert!(!outcomes[1].1.is_success());

    let bad = svc.playlist_detail("bad").await.unwrap();
    assert!(bad.error_message.unwrap().contains("500"));
    let good = svc.playlist_detail("good").await.unwrap();
    assert!(good.error_message.is_none());
}

#[tokio::test]
async fn test_reconcile_all_counts_downloads() {
    let root = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default().with_playlist("abc", &[("A", "One"), ("B", "Two")]);
    let svc = service(config(root.path(), &[]), catalog, InstantLauncher::new(0));
    let entry = svc.get_or_create("abc", "u").await;
    svc.refresh("abc").await.unwrap().wait().await;

    let dir = entry.read().await.download_dir.clone();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("B - Two.flac"), b"audio").unwrap();

    let results = svc.reconcile_all().await;
    assert_eq!(results.len(), 1);
    let stats = results[0].1.as_ref().unwrap();
    assert_eq!(stats.downloaded, 1);
    assert_eq!(svc.list_summaries().await[0].downloaded_count, 1);
}

#[tokio::test]
async fn test_add_playlist_rejects_blank() {
    let root = tempfile::tempdir().unwrap();
    let svc = service(config(root.path(), &[]), FakeCatalog::default(), InstantLauncher::new(0));

    assert!(matches!(
        svc.add_playlist("   ").await,
        Err(ServiceError::InvalidPlaylistUrl(_))
    ));
    let entry = svc
        .add_playlist("https://open.spotify.com/playlist/xyz789")
        .await
        .unwrap();
    assert_eq!(entry.id(), "xyz789");
}

#[tokio::test]
async fn test_downloader_args_reach_launcher() {
    let root = tempfile::tempdir().unwrap();
    let launcher = Arc::new(InstantLauncher::new(0));
    let deps = MirrorDependencies::new(
        Arc::new(FakeCatalog::default()),
        Arc::new(TokioFileSystem::new()),
        launcher.clone(),
    );
    let svc = MirrorService::new(config(root.path(), &[]), deps).unwrap();
    svc.get_or_create("abc", "spotify:playlist:abc").await;

    svc.start_job("abc").await.unwrap().wait().await;

    let launched = launcher.launched.lock().unwrap();
    assert_eq!(
        launched[0].args,
        vec!["spotify:playlist:abc", "--output", "{artist} - {title}"]
    );
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let mut config = MirrorConfig::default();
    config.log_capacity = 0;
    let deps = MirrorDependencies::new(
        Arc::new(FakeCatalog::default()),
        Arc::new(EmptyFs),
        Arc::new(InstantLauncher::new(0)),
    );
    assert!(matches!(
        MirrorService::new(config, deps),
        Err(ServiceError::Config(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_refreshes_periodically_until_shutdown() {
    let catalog = Arc::new(FakeCatalog::default().with_playlist("abc", &[("A", "One")]));
    let deps = MirrorDependencies::new(
        catalog.clone(),
        Arc::new(EmptyFs),
        Arc::new(InstantLauncher::new(0)),
    );
    let svc = MirrorService::new(MirrorConfig::default(), deps).unwrap();
    svc.get_or_create("abc", "u").await;

    let handle =
        MirrorScheduler::start_with(svc.clone(), Some(Duration::from_secs(60)), None);
    assert_eq!(handle.loop_count(), 1);

    // Nothing fires before the first full interval
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(catalog.metadata_calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(catalog.metadata_calls.load(Ordering::SeqCst), 2);

    handle.shutdown().await;
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(catalog.metadata_calls.load(Ordering::SeqCst), 2);
}
