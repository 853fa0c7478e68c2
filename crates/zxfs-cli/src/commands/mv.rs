//! Mv command - rename a rule on its host

use anyhow::{Context, Result};
use clap::Args;

use crate::output::{get_formatter, OutputFormat};
use crate::session::Session;

#[derive(Debug, Args)]
pub struct MvCommand {
    pub from: String,
    pub to: String,
}

impl MvCommand {
    pub async fn execute(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let fs = session.fs();
        let from = super::resolve(fs, &self.from)?;
        let to = super::resolve(fs, &self.to)?;
        let renamed = fs
            .rename(&from, &to)
            .with_context(|| format!("Cannot rename {} to {}", self.from, self.to))?;

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "from": from.uri(),
                "to": renamed.uri(),
            }));
        } else {
            formatter.success(&format!("Renamed {} to {}", from.uri(), renamed.uri()));
        }
        Ok(())
    }
}
