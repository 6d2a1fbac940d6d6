//! Periodic metadata refresh and download scans.
//!
//! Two independent loops, each optional:
//!
//! - every `metadata_refresh_interval`, refresh all playlists;
//! - every `download_scan_interval`, reconcile all playlists so progress of a
//!   running download shows up without waiting for the tool to exit.
//!
//! The first tick of each loop fires one full interval after start; startup
//! registration already triggers an initial refresh. Failures are logged and
//! the loops keep going until [`SchedulerHandle::shutdown`].

use crate::MirrorService;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stop handle for the background loops
#[derive(Debug)]
pub struct SchedulerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Number of loops that were started
    pub fn loop_count(&self) -> usize {
        self.tasks.len()
    }

    /// Token observed by every loop; cancelling it stops them.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop both loops and wait for them to finish their current pass
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler loop ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}

pub struct MirrorScheduler;

impl MirrorScheduler {
    /// Start the loops using the intervals from the service's config
    pub fn start(service: MirrorService) -> SchedulerHandle {
        let refresh = service.config().metadata_refresh_interval;
        let scan = service.config().download_scan_interval;
        Self::start_with(service, refresh, scan)
    }

    /// Start the loops with explicit intervals; `None` disables a loop
    pub fn start_with(
        service: MirrorService,
        refresh_interval: Option<Duration>,
        scan_interval: Option<Duration>,
    ) -> SchedulerHandle {
        let token = CancellationToken::new();
        let mut tasks = Vec::new();

        if let Some(period) = refresh_interval {
            let service = service.clone();
            let token = token.child_token();
            tasks.push(tokio::spawn(async move {
                run_every(period, token, "metadata refresh", || {
                    let service = service.clone();
                    async move {
                        let outcomes = service.refresh_all().await;
                        debug!(playlists = outcomes.len(), "Periodic refresh pass done");
                    }
                })
                .await;
            }));
        }

        if let Some(period) = scan_interval {
            let service = service.clone();
            let token = token.child_token();
            tasks.push(tokio::spawn(async move {
                run_every(period, token, "download scan", || {
                    let service = service.clone();
                    async move {
                        let results = service.reconcile_all().await;
                        debug!(playlists = results.len(), "Periodic scan pass done");
                    }
                })
                .await;
            }));
        }

        info!(
            refresh_interval = ?refresh_interval,
            scan_interval = ?scan_interval,
            "Scheduler started"
        );
        SchedulerHandle { token, tasks }
    }
}

async fn run_every<F, Fut>(
    period: Duration,
    token: CancellationToken,
    name: &'static str,
    mut pass: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(loop_name = name, "Scheduler loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                debug!(loop_name = name, "Scheduler tick");
                pass().await;
            }
        }
    }
}
