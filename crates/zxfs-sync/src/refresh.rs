//! One refresh pass over a host
//!
//! Lists the device's rules, reconciles the host's collection, fetches each
//! rule and records the outcome as sync state. Nothing is retried here: a
//! failure becomes `CannotSync` with its typed cause and the next poll tries
//! again.
//!
//! The listing and each fetch are tagged with the host's or rule's
//! generation before the device is asked, so a create, delete, rename or
//! write the user commits while the request is in flight is never undone.
//!
//! ## Flow
//!
//! ```text
//! list_rules ──→ Host::apply_listing_since ──→ get_rule (per rule) ──→ Host state
//!     │                                       │
//!     └─ error: host CannotSync               └─ error: rule CannotSync
//! ```

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use zxfs_core::domain::{Host, HostKey, RemoteError};

/// Summary of one refresh pass
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub host: HostKey,
    pub started_at: DateTime<Utc>,
    /// Rules newly listed by the device
    pub rules_added: u32,
    /// Rules no longer listed by the device
    pub rules_removed: u32,
    /// Rules whose content was fetched
    pub rules_fetched: u32,
    /// Rules left in `CannotSync`
    pub rules_failed: u32,
    /// Messages of the per-rule failures
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl RefreshReport {
    fn new(host: HostKey) -> Self {
        Self {
            host,
            started_at: Utc::now(),
            rules_added: 0,
            rules_removed: 0,
            rules_fetched: 0,
            rules_failed: 0,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }
}

/// Refreshes `host` and the content of all its rules.
pub fn refresh_host(host: &Host) -> Result<RefreshReport, RemoteError> {
    refresh_host_with(host, true)
}

/// Refreshes `host`; with `fetch_content` false only the listing is
/// reconciled and rules keep their current state.
///
/// # Errors
/// The listing failure, after it has been recorded on the host.
pub fn refresh_host_with(host: &Host, fetch_content: bool) -> Result<RefreshReport, RemoteError> {
    let start = Instant::now();
    let mut report = RefreshReport::new(host.key().clone());
    let device = host.device();

    let generation = host.mutation_generation();
    let names = match device.list_rules() {
        Ok(names) => names,
        Err(err) => {
            warn!(host = %host.key(), error = %err, "Listing rules failed");
            if let Err(e) = host.mark_failed(err.clone()) {
                debug!(host = %host.key(), error = %e, "Could not record listing failure");
            }
            return Err(err);
        }
    };

    let changes = host.apply_listing_since(names, generation);
    report.rules_added = changes.added.len() as u32;
    report.rules_removed = changes.removed.len() as u32;

    if fetch_content {
        for rule in host.rules() {
            let generation = rule.generation();
            match device.get_rule(rule.name()) {
                Ok(content) => match rule.apply_fetched_since(content, generation) {
                    Ok(true) => report.rules_fetched += 1,
                    Ok(false) => {
                        debug!(host = %host.key(), rule = %rule.name(), "Rule written during refresh");
                    }
                    Err(e) => {
                        debug!(host = %host.key(), rule = %rule.name(), error = %e, "Rule removed during refresh");
                    }
                },
                Err(err) => {
                    debug!(host = %host.key(), rule = %rule.name(), error = %err, "Fetching rule failed");
                    report.rules_failed += 1;
                    report.errors.push(format!("{}: {}", rule.name(), err));
                    if let Err(e) = rule.mark_failed(err) {
                        debug!(host = %host.key(), rule = %rule.name(), error = %e, "Could not record rule failure");
                    }
                }
            }
        }
    }

    // The user may have suspended polling while we were busy.
    if !host.is_disconnected() {
        if let Err(e) = host.mark_up_to_date() {
            debug!(host = %host.key(), error = %e, "Host removed during refresh");
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        host = %host.key(),
        added = report.rules_added,
        removed = report.rules_removed,
        fetched = report.rules_fetched,
        failed = report.rules_failed,
        duration_ms = report.duration_ms,
        "Host refreshed"
    );
    Ok(report)
}
