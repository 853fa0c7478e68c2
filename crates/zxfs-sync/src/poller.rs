//! Poller - periodically refreshes every linked host
//!
//! The [`Poller`] owns the refresh cadence. Each cycle walks the controller's
//! hosts, skips the ones the user disconnected, and runs
//! [`refresh_host_with`](crate::refresh::refresh_host_with) for the rest on
//! the blocking thread pool, one host at a time.
//!
//! ## Triggers
//!
//! ```text
//! interval tick ──┐
//!                 ├──→ poll_once ──→ refresh_host (spawn_blocking)
//! request_poll ───┘
//! ```
//!
//! [`request_poll()`](Poller::request_poll) wakes the loop immediately for
//! "refresh now" commands, without waiting for the next tick.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zxfs_core::config::PollConfig;
use zxfs_core::domain::Controller;

use crate::refresh::{refresh_host_with, RefreshReport};
use crate::PollError;

/// Outcome of one polling cycle
#[derive(Debug, Default, Clone, Serialize)]
pub struct PollSummary {
    pub reports: Vec<RefreshReport>,
    /// Hosts whose listing failed
    pub hosts_failed: u32,
    /// Disconnected hosts that were not contacted
    pub hosts_skipped: u32,
}

impl PollSummary {
    pub fn hosts_refreshed(&self) -> usize {
        self.reports.len()
    }
}

/// Refreshes the model on a fixed interval and on demand
pub struct Poller {
    controller: Arc<Controller>,
    interval: Duration,
    fetch_content: bool,
    wake: Notify,
}

impl Poller {
    /// Creates a poller refreshing `controller` every `interval`
    pub fn new(controller: Arc<Controller>, interval: Duration) -> Self {
        info!(interval_ms = interval.as_millis() as u64, "Creating poller");
        Self {
            controller,
            interval,
            fetch_content: true,
            wake: Notify::new(),
        }
    }

    /// Creates a poller from the `poll` configuration section
    pub fn from_config(controller: Arc<Controller>, config: &PollConfig) -> Self {
        let mut poller = Self::new(controller, Duration::from_secs(config.interval_secs));
        poller.fetch_content = config.fetch_content;
        poller
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wakes the run loop for an immediate cycle
    pub fn request_poll(&self) {
        info!("Immediate poll requested");
        self.wake.notify_one();
    }

    /// Runs one cycle over every linked host.
    ///
    /// Listing failures are recorded on the host and counted, never
    /// returned; only a panicked or cancelled refresh task is an error.
    pub async fn poll_once(&self) -> Result<PollSummary, PollError> {
        let mut summary = PollSummary::default();

        for host in self.controller.hosts() {
            if host.is_disconnected() {
                debug!(host = %host.key(), "Skipping disconnected host");
                summary.hosts_skipped += 1;
                continue;
            }

            let fetch_content = self.fetch_content;
            let task_host = Arc::clone(&host);
            let outcome =
                tokio::task::spawn_blocking(move || refresh_host_with(&task_host, fetch_content))
                    .await
                    .map_err(|e| PollError::Task(e.to_string()))?;

            match outcome {
                Ok(report) => summary.reports.push(report),
                Err(err) => {
                    debug!(host = %host.key(), error = %err, "Host left in CannotSync");
                    summary.hosts_failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Main loop; returns when `shutdown` is cancelled.
    ///
    /// The first tick fires immediately, so hosts leave
    /// `WaitingForFirstUpdate` as soon as the loop starts.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Poller starting");

        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, poller stopping");
                    break;
                }
                _ = timer.tick() => {
                    self.cycle().await;
                }
                _ = self.wake.notified() => {
                    self.cycle().await;
                    timer.reset();
                }
            }
        }

        info!("Poller stopped");
    }

    async fn cycle(&self) {
        match self.poll_once().await {
            Ok(summary) => debug!(
                refreshed = summary.hosts_refreshed(),
                failed = summary.hosts_failed,
                skipped = summary.hosts_skipped,
                "Poll cycle complete"
            ),
            Err(e) => warn!(error = %e, "Poll cycle aborted"),
        }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval)
            .field("fetch_content", &self.fetch_content)
            .finish()
    }
}
