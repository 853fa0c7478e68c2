//! Put command - write a rule from a file or stdin
//!
//! The content is staged in a write buffer and committed on close, which
//! creates the rule if the host does not have it yet.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};
use crate::session::Session;

#[derive(Debug, Args)]
pub struct PutCommand {
    pub uri: String,

    /// Read the content from this file instead of stdin
    #[arg(long)]
    pub from: Option<PathBuf>,
}

impl PutCommand {
    pub async fn execute(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let content = self.read_input().await?;

        let fs = session.fs();
        let handle = super::resolve(fs, &self.uri)?;
        let mut writer = fs
            .open_write(&handle)
            .with_context(|| format!("Cannot write {}", self.uri))?;
        writer.write_all(&content)?;
        writer
            .close()
            .with_context(|| format!("Failed to commit {}", self.uri))?;

        info!(uri = %handle.uri(), bytes = content.len(), "Rule written");

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "uri": handle.uri(),
                "written": content.len(),
            }));
        } else {
            formatter.success(&format!("Wrote {} bytes to {}", content.len(), handle.uri()));
        }
        Ok(())
    }

    async fn read_input(&self) -> Result<Vec<u8>> {
        match &self.from {
            Some(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display())),
            None => {
                let mut buf = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut buf)
                    .context("Failed to read stdin")?;
                Ok(buf)
            }
        }
    }
}
