//! Status command - show every linked host and its sync state
//!
//! Per host: state, last successful sync, rule count and, for hosts or
//! rules that cannot sync, the recorded cause.

use anyhow::Result;
use clap::Args;
use zxfs_core::domain::{Host, SyncState};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};
use crate::session::Session;

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let hosts = session.fs().controller().hosts();

        if matches!(format, OutputFormat::Json) {
            let json: Vec<_> = hosts.iter().map(|host| host_json(host)).collect();
            formatter.print_json(&serde_json::json!({ "hosts": json }));
            return Ok(());
        }

        if hosts.is_empty() {
            formatter.warn("No hosts linked. Add devices to the snapshot or config.");
            return Ok(());
        }

        formatter.success(&format!("{} host(s)", hosts.len()));
        for host in &hosts {
            show_host(host, &*formatter);
        }
        Ok(())
    }
}

fn host_json(host: &Host) -> serde_json::Value {
    let status = host.status();
    let failing: Vec<_> = host
        .rules()
        .iter()
        .filter(|rule| rule.state() == SyncState::CannotSync)
        .map(|rule| {
            serde_json::json!({
                "rule": rule.name(),
                "error": rule.last_error().map(|e| e.to_string()),
            })
        })
        .collect();

    serde_json::json!({
        "host": host.key().to_string(),
        "state": status.state(),
        "last_synced": status.last_synced().map(|t| t.to_rfc3339()),
        "error": status.cause().map(|e| e.to_string()),
        "rules": host.rules().len(),
        "failing_rules": failing,
    })
}

fn show_host(host: &Host, formatter: &dyn OutputFormatter) {
    let status = host.status();
    formatter.info("");
    formatter.info(&format!("{}  [{}]", host.key(), status.state()));
    match status.last_synced() {
        Some(time) => formatter.info(&format!(
            "  Last sync: {}",
            time.format("%Y-%m-%d %H:%M:%S UTC")
        )),
        None => formatter.info("  Last sync: Never"),
    }
    formatter.info(&format!("  Rules: {}", host.rules().len()));
    if let Some(cause) = status.cause() {
        formatter.error(&format!("{}: {}", host.key(), cause));
    }
    for rule in host.rules() {
        if rule.state() == SyncState::CannotSync {
            let reason = rule
                .last_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            formatter.warn(&format!("{}/{}: {}", host.key(), rule.name(), reason));
        }
    }
}
