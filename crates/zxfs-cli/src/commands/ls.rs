//! Ls command - list the children of a directory handle

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};
use crate::session::Session;

#[derive(Debug, Args)]
pub struct LsCommand {
    /// Directory or rule URI, e.g. zxtm://lb1:9090/Rules
    pub uri: String,
}

impl LsCommand {
    pub async fn execute(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let fs = session.fs();
        let handle = super::resolve(fs, &self.uri)?;
        let meta = fs.metadata(&handle);

        if !meta.exists {
            bail!("No such file or directory: {}", self.uri);
        }

        let entries = if meta.is_directory {
            fs.list_children(&handle)
        } else {
            vec![handle.name().to_string()]
        };
        info!(uri = %handle.uri(), entries = entries.len(), "Listed");

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "uri": handle.uri(),
                "entries": entries,
            }));
            return Ok(());
        }

        formatter.success(&format!("{} ({} entries)", handle.uri(), entries.len()));
        for entry in &entries {
            formatter.info(entry);
        }
        Ok(())
    }
}
