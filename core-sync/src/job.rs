//! # Download Jobs
//!
//! Runs the external download tool for a playlist and follows it to
//! completion.
//!
//! ## Lifecycle
//!
//! 1. [`JobManager::start_job`] checks and claims the playlist inside a
//!    single write section, so two concurrent starts can never both succeed.
//! 2. A supervisor task is spawned straight after the claim. It launches the
//!    tool as `<program> <playlist url> <extra args...>` with the mirror
//!    directory as working directory, so a caller that stops waiting on
//!    `start_job` cannot strand the playlist in `Syncing`.
//! 3. The supervisor copies every output line into the playlist's log
//!    buffer, then waits for the exit signal and settles the status:
//!
//! | Exit             | Status | `error_message`                        | Reconcile |
//! |------------------|--------|----------------------------------------|-----------|
//! | code 0           | Idle   | unchanged                              | yes       |
//! | code N / killed  | Error  | `Download tool exited with code N`     | yes       |
//! | spawn failure    | Error  | `Failed to start download tool: ...`   | no        |
//!
//! Running jobs cannot be cancelled and have no timeout; a job ends only when
//! the tool exits.

use crate::log_buffer::LogLine;
use crate::models::{ActiveJob, PlaylistStatus};
use crate::reconciler::Reconciler;
use crate::registry::{PlaylistEntry, PlaylistRegistry};
use crate::{Result, SyncError};
use bridge_traits::process::{ProcessCommand, ProcessExit, ProcessHandle, ProcessLauncher};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use core_runtime::config::MirrorConfig;
use core_runtime::events::{CoreEvent, EventBus, JobEvent};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ============================================================================
// Outcome Types
// ============================================================================

/// How a job ended, as seen by its supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Exit code 0
    Succeeded,
    /// Nonzero exit code, or `None` when the tool was killed by a signal
    Failed { code: Option<i32> },
    /// The tool never started
    SpawnFailed { message: String },
    /// The supervisor task itself died; playlist state may be stale
    Interrupted { message: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

/// Receipt for a started job
#[derive(Debug)]
pub struct JobTicket {
    job_id: Uuid,
    playlist_id: String,
    handle: JoinHandle<JobOutcome>,
}

impl JobTicket {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the tool to exit and the playlist state to settle
    pub async fn wait(self) -> JobOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::Interrupted {
                message: e.to_string(),
            },
        }
    }
}

// ============================================================================
// Job Manager
// ============================================================================

pub struct JobManager {
    registry: Arc<PlaylistRegistry>,
    launcher: Arc<dyn ProcessLauncher>,
    fs: Arc<dyn FileSystemAccess>,
    reconciler: Arc<Reconciler>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    program: String,
    extra_args: Vec<String>,
}

impl JobManager {
    pub fn new(
        registry: Arc<PlaylistRegistry>,
        launcher: Arc<dyn ProcessLauncher>,
        fs: Arc<dyn FileSystemAccess>,
        reconciler: Arc<Reconciler>,
        program: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            launcher,
            fs,
            reconciler,
            clock: Arc::new(SystemClock),
            event_bus: None,
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Program and extra arguments taken from the config
    pub fn from_config(
        config: &MirrorConfig,
        registry: Arc<PlaylistRegistry>,
        launcher: Arc<dyn ProcessLauncher>,
        fs: Arc<dyn FileSystemAccess>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self::new(
            registry,
            launcher,
            fs,
            reconciler,
            config.downloader_program.clone(),
        )
        .with_args(config.downloader_args.clone())
    }

    /// Arguments appended after the playlist url
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Launch the download tool for a playlist
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotFound`] for an unknown id
    /// - [`SyncError::AlreadyInProgress`] while a job is running; the
    ///   playlist is left exactly as it was
    /// - [`SyncError::Filesystem`] if the mirror directory cannot be created
    ///
    /// Failures of the tool itself are not errors here; they land in the
    /// playlist state and in [`JobTicket::wait`].
    #[instrument(skip(self))]
    pub async fn start_job(&self, playlist_id: &str) -> Result<JobTicket> {
        let entry = self
            .registry
            .get(playlist_id)
            .await
            .ok_or_else(|| SyncError::NotFound {
                playlist_id: playlist_id.to_string(),
            })?;

        let download_dir = {
            let playlist = entry.read().await;
            if playlist.active_job.is_some() {
                return Err(already_in_progress(playlist_id));
            }
            playlist.download_dir.clone()
        };

        self.fs
            .create_dir_all(&download_dir)
            .await
            .map_err(|source| SyncError::Filesystem {
                path: download_dir.clone(),
                source,
            })?;

        let job_id = Uuid::new_v4();
        let started_at = self.clock.now();

        // Check and claim under one guard
        let url = {
            let mut playlist = entry.write().await;
            if playlist.active_job.is_some() {
                return Err(already_in_progress(playlist_id));
            }
            playlist
                .transition(PlaylistStatus::Syncing)
                .map_err(|_| already_in_progress(playlist_id))?;
            playlist.active_job = Some(ActiveJob {
                job_id,
                started_at,
                pid: None,
            });
            playlist.error_message = None;
            playlist.url.clone()
        };

        let command = ProcessCommand::new(&self.program, &download_dir)
            .arg(url)
            .args(self.extra_args.iter().cloned());

        // No suspension point between the claim and the spawn: once claimed,
        // the job is owned by its supervisor even if this future is dropped.
        let supervisor = JobSupervisor {
            entry,
            launcher: Arc::clone(&self.launcher),
            reconciler: Arc::clone(&self.reconciler),
            clock: Arc::clone(&self.clock),
            event_bus: self.event_bus.clone(),
            job_id,
            started_at,
        };
        let handle = tokio::spawn(supervisor.run(command));

        Ok(JobTicket {
            job_id,
            playlist_id: playlist_id.to_string(),
            handle,
        })
    }
}

fn already_in_progress(playlist_id: &str) -> SyncError {
    SyncError::AlreadyInProgress {
        playlist_id: playlist_id.to_string(),
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Owns one running job from launch to settled state
struct JobSupervisor {
    entry: Arc<PlaylistEntry>,
    launcher: Arc<dyn ProcessLauncher>,
    reconciler: Arc<Reconciler>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    job_id: Uuid,
    started_at: DateTime<Utc>,
}

impl JobSupervisor {
    #[instrument(skip_all, fields(playlist_id = %self.entry.id(), job_id = %self.job_id))]
    async fn run(self, command: ProcessCommand) -> JobOutcome {
        debug!(program = %command.program, args = ?command.args, "Launching download tool");
        let ProcessHandle {
            pid,
            mut lines,
            exit,
        } = self.launcher.launch(command).await;

        if let Some(job) = self.entry.write().await.active_job.as_mut() {
            if job.job_id == self.job_id {
                job.pid = pid;
            }
        }
        info!(?pid, "Download job started");
        self.emit(JobEvent::Started {
            job_id: self.job_id.to_string(),
            playlist_id: self.entry.id().to_string(),
            pid,
        });

        while let Some(line) = lines.recv().await {
            self.entry
                .append_log(LogLine::new(self.clock.now(), line.stream, line.text))
                .await;
        }

        // A launcher that drops its reporter without finishing counts as killed
        let exit = exit.await.unwrap_or(ProcessExit::Exited { code: None });

        let writer = self.entry.lock_writer().await;
        let now = self.clock.now();

        let (outcome, reconcile) = {
            let mut playlist = self.entry.write().await;
            playlist.active_job = None;

            let (outcome, next, reconcile) = match exit {
                ProcessExit::Exited { code: Some(0) } => {
                    playlist.last_sync_at = Some(now);
                    (JobOutcome::Succeeded, PlaylistStatus::Idle, true)
                }
                ProcessExit::Exited { code } => {
                    playlist.error_message = Some(SyncError::ProcessExit { code }.to_string());
                    (JobOutcome::Failed { code }, PlaylistStatus::Error, true)
                }
                ProcessExit::SpawnFailed { message } => {
                    playlist.error_message =
                        Some(SyncError::Spawn { message: message.clone() }.to_string());
                    (JobOutcome::SpawnFailed { message }, PlaylistStatus::Error, false)
                }
            };

            if let Err(e) = playlist.transition(next) {
                error!(error = %e, "Job finished from an unexpected status");
                playlist.status = next;
            }
            (outcome, reconcile)
        };

        if reconcile {
            if let Err(e) = self.reconciler.reconcile_locked(&self.entry, &writer).await {
                warn!(error = %e, "Reconciliation after job exit failed");
            }
        }
        drop(writer);

        self.report(&outcome, now);
        outcome
    }

    fn report(&self, outcome: &JobOutcome, finished_at: DateTime<Utc>) {
        let job_id = self.job_id.to_string();
        let playlist_id = self.entry.id().to_string();

        let event = match outcome {
            JobOutcome::Succeeded => {
                let duration_secs = (finished_at - self.started_at).num_seconds().max(0) as u64;
                info!(duration_secs, "Download job completed");
                JobEvent::Completed {
                    job_id,
                    playlist_id,
                    duration_secs,
                }
            }
            JobOutcome::Failed { code } => {
                let message = SyncError::ProcessExit { code: *code }.to_string();
                warn!(?code, "Download job failed");
                JobEvent::Failed {
                    job_id,
                    playlist_id,
                    message,
                }
            }
            JobOutcome::SpawnFailed { message } | JobOutcome::Interrupted { message } => {
                warn!(error = %message, "Download tool could not be started");
                JobEvent::Failed {
                    job_id,
                    playlist_id,
                    message: message.clone(),
                }
            }
        };

        self.emit(event);
    }

    fn emit(&self, event: JobEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Job(event));
        }
    }
}
