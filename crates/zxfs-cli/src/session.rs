//! Session - one CLI invocation's view of the namespace
//!
//! Wires a snapshot-backed connector into a controller, links the hosts
//! named by the snapshot and the configuration, refreshes them once and
//! exposes the result as a [`RuleFs`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use zxfs_core::config::Config;
use zxfs_core::domain::Controller;
use zxfs_core::ports::MemoryConnector;
use zxfs_sync::Poller;
use zxfs_vfs::RuleFs;

use crate::snapshot::{mutation_count, Snapshot};

pub struct Session {
    fs: RuleFs,
    connector: Arc<MemoryConnector>,
    snapshot: Snapshot,
    snapshot_path: PathBuf,
}

impl Session {
    /// Loads the snapshot, links every host and runs one refresh pass.
    pub async fn open(config: &Config, snapshot_path: &Path) -> Result<Self> {
        let snapshot = Snapshot::load(snapshot_path)?;
        let connector = snapshot.connector()?;
        let controller = Arc::new(Controller::new(connector.clone()));

        for device in &snapshot.devices {
            let key = device.key()?;
            controller
                .add_host(key, device.credentials())
                .with_context(|| format!("Duplicate device in {}", snapshot_path.display()))?;
        }
        for host in &config.hosts {
            let key = host.key().context("Invalid host in configuration")?;
            if controller.get_host(&key).is_some() {
                debug!(host = %key, "Host already linked from snapshot");
                continue;
            }
            controller.add_host(key, host.credentials())?;
        }

        let poller = Poller::from_config(Arc::clone(&controller), &config.poll);
        let summary = poller.poll_once().await.context("Initial refresh failed")?;
        if summary.hosts_failed > 0 {
            warn!(failed = summary.hosts_failed, "Some hosts could not be refreshed");
        }
        info!(
            hosts = controller.len(),
            refreshed = summary.hosts_refreshed(),
            "Session ready"
        );

        Ok(Self {
            fs: RuleFs::new(controller),
            connector,
            snapshot,
            snapshot_path: snapshot_path.to_path_buf(),
        })
    }

    pub fn fs(&self) -> &RuleFs {
        &self.fs
    }

    /// Writes the snapshot back if any device was changed.
    ///
    /// Returns whether the file was written.
    pub fn finish(mut self) -> Result<bool> {
        if mutation_count(&self.connector) == 0 {
            debug!("No remote changes, snapshot left untouched");
            return Ok(false);
        }
        self.snapshot.capture(&self.connector);
        self.snapshot.save(&self.snapshot_path)?;
        Ok(true)
    }
}
