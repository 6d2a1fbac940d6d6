//! Mirror service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (catalog source,
//! filesystem, process launcher, clock) into the sync core and exposes the
//! operations a UI or CLI layer needs. Desktop and server hosts typically
//! enable the `desktop-shims` feature, which builds every dependency from
//! `bridge-desktop` and `provider-spotify` via [`bootstrap_desktop`].

pub mod error;
pub mod scheduler;

pub use error::{Result, ServiceError};
pub use scheduler::{MirrorScheduler, SchedulerHandle};

use std::sync::Arc;

use bridge_traits::{
    catalog::PlaylistSource,
    process::ProcessLauncher,
    storage::FileSystemAccess,
    time::{Clock, SystemClock},
};
use core_runtime::{config::MirrorConfig, events::EventBus};
use core_sync::{
    JobManager, JobTicket, LogLine, MetadataSync, PlaylistDetail, PlaylistEntry, PlaylistRegistry,
    PlaylistSummary, ReconcileStats, Reconciler, RefreshOutcome, RefreshTask, SyncError, Track,
};
use provider_spotify::extract_playlist_id;
use tracing::{info, instrument, warn};

/// Aggregated handle to all bridge dependencies the mirror requires.
pub struct MirrorDependencies {
    pub source: Arc<dyn PlaylistSource>,
    pub filesystem: Arc<dyn FileSystemAccess>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub clock: Arc<dyn Clock>,
}

impl MirrorDependencies {
    /// Construct a dependency bundle from explicit bridge handles, using the
    /// system clock.
    pub fn new(
        source: Arc<dyn PlaylistSource>,
        filesystem: Arc<dyn FileSystemAccess>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            source,
            filesystem,
            launcher,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Primary façade exposed to host applications.
///
/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct MirrorService {
    config: Arc<MirrorConfig>,
    registry: Arc<PlaylistRegistry>,
    metadata: Arc<MetadataSync>,
    reconciler: Arc<Reconciler>,
    jobs: Arc<JobManager>,
    events: EventBus,
}

impl MirrorService {
    /// Create a new service from a validated config and its dependencies.
    pub fn new(config: MirrorConfig, deps: MirrorDependencies) -> Result<Self> {
        config.validate()?;

        let events = EventBus::default();
        let registry =
            Arc::new(PlaylistRegistry::from_config(&config).with_event_bus(events.clone()));
        let reconciler = Arc::new(
            Reconciler::new(Arc::clone(&deps.filesystem))
                .with_audio_extensions(&config.audio_extensions)
                .with_event_bus(events.clone()),
        );
        let metadata = Arc::new(
            MetadataSync::new(Arc::clone(&deps.source), Arc::clone(&reconciler))
                .with_clock(Arc::clone(&deps.clock))
                .with_event_bus(events.clone()),
        );
        let jobs = Arc::new(
            JobManager::from_config(
                &config,
                Arc::clone(&registry),
                deps.launcher,
                deps.filesystem,
                Arc::clone(&reconciler),
            )
            .with_clock(deps.clock)
            .with_event_bus(events.clone()),
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            metadata,
            reconciler,
            jobs,
            events,
        })
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Bus carrying every playlist and job event of this service.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> Arc<PlaylistRegistry> {
        Arc::clone(&self.registry)
    }

    // ------------------------------------------------------------------
    // Registry access
    // ------------------------------------------------------------------

    /// Existing playlist, or a new Idle one. A repeat call keeps the url
    /// the playlist was first registered with.
    pub async fn get_or_create(&self, id: &str, url: &str) -> Arc<PlaylistEntry> {
        self.registry.get_or_create(id, url).await
    }

    /// Register a playlist from a url, uri or bare id.
    pub async fn add_playlist(&self, url: &str) -> Result<Arc<PlaylistEntry>> {
        let id = extract_playlist_id(url)
            .ok_or_else(|| ServiceError::InvalidPlaylistUrl(url.to_string()))?;
        Ok(self.registry.get_or_create(&id, url.trim()).await)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<PlaylistEntry>> {
        self.registry.get(id).await
    }

    pub async fn list_summaries(&self) -> Vec<PlaylistSummary> {
        self.registry.list_summaries().await
    }

    pub async fn playlist_detail(&self, id: &str) -> Result<PlaylistDetail> {
        Ok(self.entry(id).await?.detail().await)
    }

    pub async fn tracks(&self, id: &str) -> Result<Vec<Track>> {
        Ok(self.entry(id).await?.tracks().await)
    }

    /// Captured download tool output, oldest first.
    pub async fn logs(&self, id: &str) -> Result<Vec<LogLine>> {
        Ok(self.entry(id).await?.logs().await)
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Start the download tool for a playlist.
    ///
    /// Fails with `NotFound` or `AlreadyInProgress`; everything that happens
    /// after launch is reported through playlist state and the ticket.
    pub async fn start_job(&self, id: &str) -> Result<JobTicket> {
        Ok(self.jobs.start_job(id).await?)
    }

    /// Fire-and-forget refresh of one playlist.
    pub async fn refresh(&self, id: &str) -> Result<RefreshTask> {
        let entry = self.entry(id).await?;
        Ok(self.metadata.spawn_refresh(entry))
    }

    /// Refresh every playlist concurrently and wait for all of them.
    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> Vec<(String, RefreshOutcome)> {
        let tasks: Vec<RefreshTask> = self
            .registry
            .entries()
            .await
            .into_iter()
            .map(|entry| self.metadata.spawn_refresh(entry))
            .collect();

        let ids: Vec<String> = tasks.iter().map(|t| t.playlist_id().to_string()).collect();
        let outcomes = futures::future::join_all(tasks.into_iter().map(RefreshTask::wait)).await;

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(playlists = ids.len(), failed, "Refreshed all playlists");
        ids.into_iter().zip(outcomes).collect()
    }

    /// Reconcile every playlist against its mirror directory, one task each.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Vec<(String, core_sync::Result<ReconcileStats>)> {
        let handles: Vec<_> = self
            .registry
            .entries()
            .await
            .into_iter()
            .map(|entry| {
                let reconciler = Arc::clone(&self.reconciler);
                let id = entry.id().to_string();
                let handle = tokio::spawn(async move { reconciler.reconcile(&entry).await });
                (id, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(playlist_id = %id, error = %e, "Reconcile task failed");
                    continue;
                }
            };
            if let Err(e) = &result {
                warn!(playlist_id = %id, error = %e, "Failed to reconcile playlist");
            }
            results.push((id, result));
        }
        results
    }

    /// Register every configured playlist and start a background refresh for
    /// each. Entries whose id cannot be extracted are skipped.
    #[instrument(skip(self))]
    pub async fn register_configured_playlists(&self) -> Vec<RefreshTask> {
        if self.config.playlist_urls.is_empty() {
            warn!("No playlist urls configured");
            return Vec::new();
        }

        let mut tasks = Vec::new();
        for url in &self.config.playlist_urls {
            match self.add_playlist(url).await {
                Ok(entry) => tasks.push(self.metadata.spawn_refresh(entry)),
                Err(e) => warn!(error = %e, "Skipping configured playlist"),
            }
        }
        info!(count = tasks.len(), "Registered configured playlists");
        tasks
    }

    async fn entry(&self, id: &str) -> Result<Arc<PlaylistEntry>> {
        self.registry.get(id).await.ok_or_else(|| {
            ServiceError::Sync(SyncError::NotFound {
                playlist_id: id.to_string(),
            })
        })
    }
}

/// Convenience bootstrapper for desktop and server hosts.
///
/// Builds the reqwest HTTP client, the Spotify connector, the tokio
/// filesystem and the tokio process launcher.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::config::MirrorConfig;
/// use core_service::bootstrap_desktop;
///
/// let service = bootstrap_desktop(MirrorConfig::from_env()?)?;
/// service.register_configured_playlists().await;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: MirrorConfig) -> Result<MirrorService> {
    use bridge_desktop::{ReqwestHttpClient, TokioFileSystem, TokioProcessLauncher};
    use provider_spotify::SpotifyConnector;

    if !config.credentials.is_complete() {
        warn!("Spotify credentials missing; every metadata refresh will fail");
    }

    let http = ReqwestHttpClient::new()
        .map_err(|e| ServiceError::InitializationFailed(e.to_string()))?;
    let source = SpotifyConnector::new(Arc::new(http), config.credentials.clone());

    let deps = MirrorDependencies::new(
        Arc::new(source),
        Arc::new(TokioFileSystem::new()),
        Arc::new(TokioProcessLauncher::new()),
    );
    MirrorService::new(config, deps)
}
