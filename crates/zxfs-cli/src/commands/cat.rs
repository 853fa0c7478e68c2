//! Cat command - print the content of a rule

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use crate::output::{get_formatter, OutputFormat};
use crate::session::Session;

#[derive(Debug, Args)]
pub struct CatCommand {
    pub uri: String,
}

impl CatCommand {
    pub async fn execute(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let fs = session.fs();
        let handle = super::resolve(fs, &self.uri)?;
        let content = fs
            .open_read(&handle)
            .with_context(|| format!("Cannot read {}", self.uri))?;

        if matches!(format, OutputFormat::Json) {
            let formatter = get_formatter(true);
            formatter.print_json(&serde_json::json!({
                "uri": handle.uri(),
                "length": content.len(),
                "content": String::from_utf8_lossy(&content),
            }));
            return Ok(());
        }

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&content)?;
        stdout.flush()?;
        Ok(())
    }
}
