//! Rm command - delete a rule

use anyhow::{Context, Result};
use clap::Args;

use crate::output::{get_formatter, OutputFormat};
use crate::session::Session;

#[derive(Debug, Args)]
pub struct RmCommand {
    pub uri: String,
}

impl RmCommand {
    pub async fn execute(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let fs = session.fs();
        let handle = super::resolve(fs, &self.uri)?;
        fs.delete(&handle)
            .with_context(|| format!("Cannot delete {}", self.uri))?;

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({ "deleted": handle.uri() }));
        } else {
            formatter.success(&format!("Deleted {}", handle.uri()));
        }
        Ok(())
    }
}
