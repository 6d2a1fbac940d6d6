//! Integration tests for the download job lifecycle
//!
//! The download tool is replaced by a scripted launcher that writes files
//! into the working directory, prints lines and exits with a chosen code.
//! The mirror directory is a real temporary directory.

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::catalog::RemoteTrack;
use bridge_traits::process::{
    OutputStream, ProcessCommand, ProcessExit, ProcessHandle, ProcessLauncher, ProcessReporter,
};
use bridge_traits::time::FixedClock;
use chrono::{Duration, TimeZone, Utc};
use core_runtime::events::{CoreEvent, EventBus, JobEvent};
use core_sync::{
    JobManager, JobOutcome, LocalStatus, PlaylistRegistry, PlaylistStatus, Reconciler, SyncError,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Scripted Launcher
// ============================================================================

#[derive(Clone)]
enum Script {
    Run {
        lines: Vec<(OutputStream, String)>,
        files: Vec<&'static str>,
        code: Option<i32>,
    },
    SpawnFail(&'static str),
}

impl Script {
    fn exit(code: i32) -> Self {
        Script::Run {
            lines: Vec::new(),
            files: Vec::new(),
            code: Some(code),
        }
    }
}

/// Plays one script per launch, in order
struct ScriptedLauncher {
    scripts: Mutex<VecDeque<Script>>,
    launched: Mutex<Vec<ProcessCommand>>,
    /// When set, each run waits for a permit before producing output
    gate: Option<Arc<Notify>>,
    /// When set, `launch` itself waits for a permit before returning
    launch_gate: Option<Arc<Notify>>,
}

impl ScriptedLauncher {
    fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            launched: Mutex::new(Vec::new()),
            gate: None,
            launch_gate: None,
        }
    }

    fn gated(scripts: Vec<Script>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(scripts)
        }
    }

    fn slow_to_launch(scripts: Vec<Script>, launch_gate: Arc<Notify>) -> Self {
        Self {
            launch_gate: Some(launch_gate),
            ..Self::new(scripts)
        }
    }

    fn launched(&self) -> Vec<ProcessCommand> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    async fn launch(&self, command: ProcessCommand) -> ProcessHandle {
        self.launched.lock().unwrap().push(command.clone());
        if let Some(gate) = &self.launch_gate {
            gate.notified().await;
        }
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("no script left for launch");

        if let Script::SpawnFail(message) = script {
            let (reporter, handle) = ProcessReporter::channel(None);
            reporter.finish(ProcessExit::SpawnFailed {
                message: message.to_string(),
            });
            return handle;
        }

        let (reporter, handle) = ProcessReporter::channel(Some(4242));
        let gate = self.gate.clone();
        tokio::spawn(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if let Script::Run { lines, files, code } = script {
                for file in files {
                    std::fs::write(command.working_dir.join(file), b"audio").unwrap();
                }
                for (stream, text) in lines {
                    reporter.emit(stream, text);
                }
                reporter.finish(ProcessExit::Exited { code });
            }
        });
        handle
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    registry: Arc<PlaylistRegistry>,
    jobs: JobManager,
    launcher: Arc<ScriptedLauncher>,
    clock: Arc<FixedClock>,
    events: EventBus,
}

fn harness(root: &Path, launcher: ScriptedLauncher, log_capacity: usize) -> Harness {
    let events = EventBus::new(64);
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    ));
    let fs = Arc::new(TokioFileSystem::new());
    let registry = Arc::new(
        PlaylistRegistry::new(root)
            .with_log_capacity(log_capacity)
            .with_event_bus(events.clone()),
    );
    let reconciler = Arc::new(Reconciler::new(fs.clone()).with_event_bus(events.clone()));
    let launcher = Arc::new(launcher);
    let jobs = JobManager::new(
        Arc::clone(&registry),
        launcher.clone(),
        fs,
        reconciler,
        "spotdl",
    )
    .with_args(["--format", "mp3"])
    .with_clock(clock.clone())
    .with_event_bus(events.clone());

    Harness {
        registry,
        jobs,
        launcher,
        clock,
        events,
    }
}

/// Wait until a job event matching `pred` arrives
async fn wait_for_job_event<F>(rx: &mut broadcast::Receiver<CoreEvent>, pred: F) -> JobEvent
where
    F: Fn(&JobEvent) -> bool,
{
    loop {
        if let CoreEvent::Job(event) = rx.recv().await.unwrap() {
            if pred(&event) {
                return event;
            }
        }
    }
}

fn track(artist: &str, name: &str) -> RemoteTrack {
    RemoteTrack {
        id: name.to_string(),
        name: name.to_string(),
        artists: vec![artist.to_string()],
        ..Default::default()
    }
}

async fn register_with_tracks(registry: &PlaylistRegistry, tracks: Vec<RemoteTrack>) {
    let entry = registry
        .get_or_create("abc", "https://open.spotify.com/playlist/abc")
        .await;
    entry.write().await.replace_tracks(tracks);
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_exit_zero_goes_idle_and_reconciles() {
    let root = tempfile::tempdir().unwrap();
    let script = Script::Run {
        lines: vec![
            (OutputStream::Stdout, "Downloading Artist - Song".to_string()),
            (OutputStream::Stderr, "warning: slow mirror".to_string()),
        ],
        files: vec!["Artist - Song (320kbps).mp3"],
        code: Some(0),
    };
    let gate = Arc::new(Notify::new());
    let h = harness(root.path(), ScriptedLauncher::gated(vec![script], gate.clone()), 500);
    register_with_tracks(&h.registry, vec![track("Artist", "Song"), track("Other", "Tune")]).await;

    let ticket = h.jobs.start_job("abc").await.unwrap();
    assert_eq!(ticket.playlist_id(), "abc");
    h.clock.advance(Duration::seconds(90));
    gate.notify_one();
    assert_eq!(ticket.wait().await, JobOutcome::Succeeded);

    let entry = h.registry.get("abc").await.unwrap();
    let playlist = entry.snapshot().await;
    assert_eq!(playlist.status, PlaylistStatus::Idle);
    assert!(playlist.active_job.is_none());
    assert_eq!(
        playlist.last_sync_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 1, 30).unwrap())
    );
    assert_eq!(playlist.downloaded_count, 1);
    assert_eq!(playlist.tracks[0].local_status, LocalStatus::Downloaded);
    assert_eq!(playlist.tracks[1].local_status, LocalStatus::Pending);
    assert!(playlist.error_message.is_none());

    let logs = playlist.logs.rendered();
    assert_eq!(logs.len(), 2);
    assert!(logs[0].ends_with("[stdout] Downloading Artist - Song"));
    assert!(logs[1].ends_with("[stderr] warning: slow mirror"));
}

#[tokio::test]
async fn test_command_line_and_working_directory() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path(), ScriptedLauncher::new(vec![Script::exit(0)]), 500);
    register_with_tracks(&h.registry, vec![]).await;

    h.jobs.start_job("abc").await.unwrap().wait().await;

    let launched = h.launcher.launched();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].program, "spotdl");
    assert_eq!(
        launched[0].args,
        vec!["https://open.spotify.com/playlist/abc", "--format", "mp3"]
    );
    assert_eq!(launched[0].working_dir, root.path().join("abc"));
    assert!(root.path().join("abc").is_dir());
}

#[tokio::test]
async fn test_nonzero_exit_records_error_and_still_reconciles() {
    let root = tempfile::tempdir().unwrap();
    let script = Script::Run {
        lines: vec![],
        files: vec!["Artist - Song.m4a"],
        code: Some(2),
    };
    let h = harness(root.path(), ScriptedLauncher::new(vec![script]), 500);
    register_with_tracks(&h.registry, vec![track("Artist", "Song")]).await;

    let outcome = h.jobs.start_job("abc").await.unwrap().wait().await;
    assert_eq!(outcome, JobOutcome::Failed { code: Some(2) });

    let playlist = h.registry.get("abc").await.unwrap().snapshot().await;
    assert_eq!(playlist.status, PlaylistStatus::Error);
    let message = playlist.error_message.unwrap();
    assert!(message.contains('2'), "message was {:?}", message);
    assert!(playlist.last_sync_at.is_none());
    assert_eq!(playlist.downloaded_count, 1);
}

#[tokio::test]
async fn test_spawn_failure_skips_reconcile() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("abc");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("Artist - Song.mp3"), b"audio").unwrap();

    let h = harness(
        root.path(),
        ScriptedLauncher::new(vec![Script::SpawnFail("No such file or directory")]),
        500,
    );
    register_with_tracks(&h.registry, vec![track("Artist", "Song")]).await;

    let outcome = h.jobs.start_job("abc").await.unwrap().wait().await;
    assert!(matches!(outcome, JobOutcome::SpawnFailed { .. }));

    let playlist = h.registry.get("abc").await.unwrap().snapshot().await;
    assert_eq!(playlist.status, PlaylistStatus::Error);
    assert_eq!(
        playlist.error_message.as_deref(),
        Some("Failed to start download tool: No such file or directory")
    );
    assert!(playlist.active_job.is_none());
    // The file is there but no reconciliation ran
    assert_eq!(playlist.downloaded_count, 0);
}

#[tokio::test]
async fn test_concurrent_starts_exactly_one_wins() {
    let root = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let h = harness(
        root.path(),
        ScriptedLauncher::gated(vec![Script::exit(0), Script::exit(0)], gate.clone()),
        500,
    );
    register_with_tracks(&h.registry, vec![]).await;
    let mut rx = h.events.subscribe();

    let (first, second) = tokio::join!(h.jobs.start_job("abc"), h.jobs.start_job("abc"));
    let (ticket, rejected) = match (first, second) {
        (Ok(ticket), Err(e)) | (Err(e), Ok(ticket)) => (ticket, e),
        other => panic!("expected exactly one success, got {:?}", other),
    };
    assert!(matches!(rejected, SyncError::AlreadyInProgress { .. }));
    wait_for_job_event(&mut rx, |e| matches!(e, JobEvent::Started { .. })).await;

    let entry = h.registry.get("abc").await.unwrap();
    let playlist = entry.snapshot().await;
    assert_eq!(playlist.status, PlaylistStatus::Syncing);
    assert_eq!(playlist.active_job.as_ref().unwrap().job_id, ticket.job_id());
    assert_eq!(playlist.active_job.as_ref().unwrap().pid, Some(4242));
    assert!(playlist.error_message.is_none());
    assert_eq!(h.launcher.launched().len(), 1);

    gate.notify_one();
    assert!(ticket.wait().await.is_success());
}

#[tokio::test]
async fn test_start_while_syncing_leaves_error_message_alone() {
    let root = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let h = harness(
        root.path(),
        ScriptedLauncher::gated(vec![Script::exit(0)], gate.clone()),
        500,
    );
    register_with_tracks(&h.registry, vec![]).await;

    let ticket = h.jobs.start_job("abc").await.unwrap();
    let entry = h.registry.get("abc").await.unwrap();
    entry.write().await.error_message = Some("refresh failed".to_string());

    let err = h.jobs.start_job("abc").await.unwrap_err();
    assert!(matches!(err, SyncError::AlreadyInProgress { .. }));
    assert_eq!(
        entry.read().await.error_message.as_deref(),
        Some("refresh failed")
    );

    gate.notify_one();
    ticket.wait().await;
}

#[tokio::test]
async fn test_error_is_not_sticky() {
    let root = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let h = harness(
        root.path(),
        ScriptedLauncher::gated(vec![Script::exit(1), Script::exit(0)], gate.clone()),
        500,
    );
    register_with_tracks(&h.registry, vec![]).await;
    let entry = h.registry.get("abc").await.unwrap();

    gate.notify_one();
    h.jobs.start_job("abc").await.unwrap().wait().await;
    assert_eq!(entry.read().await.status, PlaylistStatus::Error);

    let retry = h.jobs.start_job("abc").await.unwrap();
    {
        let playlist = entry.read().await;
        assert_eq!(playlist.status, PlaylistStatus::Syncing);
        assert!(playlist.error_message.is_none());
    }

    gate.notify_one();
    assert!(retry.wait().await.is_success());
    assert_eq!(entry.read().await.status, PlaylistStatus::Idle);
}

#[tokio::test]
async fn test_job_settles_after_caller_stops_waiting() {
    let root = tempfile::tempdir().unwrap();
    let launch_gate = Arc::new(Notify::new());
    let h = harness(
        root.path(),
        ScriptedLauncher::slow_to_launch(vec![Script::exit(0), Script::exit(0)], launch_gate.clone()),
        500,
    );
    register_with_tracks(&h.registry, vec![]).await;
    let entry = h.registry.get("abc").await.unwrap();
    let mut rx = h.events.subscribe();

    // The launcher is stuck, yet start_job returns; the ticket is then dropped
    let started = tokio::time::timeout(
        std::time::Duration::from_millis(500),
        h.jobs.start_job("abc"),
    )
    .await;
    let ticket = started.expect("start_job waited on the launcher").unwrap();
    drop(ticket);
    assert_eq!(entry.read().await.status, PlaylistStatus::Syncing);

    launch_gate.notify_one();
    wait_for_job_event(&mut rx, |e| matches!(e, JobEvent::Completed { .. })).await;
    {
        let playlist = entry.read().await;
        assert_eq!(playlist.status, PlaylistStatus::Idle);
        assert!(playlist.active_job.is_none());
    }

    let retry = h.jobs.start_job("abc").await.unwrap();
    launch_gate.notify_one();
    assert!(retry.wait().await.is_success());
}

#[tokio::test]
async fn test_unknown_playlist() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path(), ScriptedLauncher::new(vec![]), 500);

    let err = h.jobs.start_job("missing").await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound { .. }));
    assert!(h.launcher.launched().is_empty());
}

#[tokio::test]
async fn test_log_capacity_keeps_latest_lines() {
    let root = tempfile::tempdir().unwrap();
    let script = Script::Run {
        lines: (0..8)
            .map(|i| (OutputStream::Stdout, format!("line {}", i)))
            .collect(),
        files: vec![],
        code: Some(0),
    };
    let h = harness(root.path(), ScriptedLauncher::new(vec![script]), 5);
    register_with_tracks(&h.registry, vec![]).await;

    h.jobs.start_job("abc").await.unwrap().wait().await;

    let logs = h.registry.get("abc").await.unwrap().logs().await;
    let texts: Vec<_> = logs.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["line 3", "line 4", "line 5", "line 6", "line 7"]);
}

#[tokio::test]
async fn test_job_events() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path(), ScriptedLauncher::new(vec![Script::exit(3)]), 500);
    register_with_tracks(&h.registry, vec![]).await;
    let mut rx = h.events.subscribe();

    let ticket = h.jobs.start_job("abc").await.unwrap();
    let job_id = ticket.job_id().to_string();
    ticket.wait().await;

    let mut job_events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Job(event) = event {
            job_events.push(event);
        }
    }
    assert_eq!(
        job_events,
        vec![
            JobEvent::Started {
                job_id: job_id.clone(),
                playlist_id: "abc".to_string(),
                pid: Some(4242),
            },
            JobEvent::Failed {
                job_id,
                playlist_id: "abc".to_string(),
                message: "Download tool exited with code 3".to_string(),
            },
        ]
    );
}
