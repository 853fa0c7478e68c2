//! Stat command - show the metadata of a handle

use anyhow::Result;
use clap::Args;

use crate::output::{get_formatter, OutputFormat};
use crate::session::Session;

#[derive(Debug, Args)]
pub struct StatCommand {
    pub uri: String,
}

impl StatCommand {
    pub async fn execute(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let fs = session.fs();
        let handle = super::resolve(fs, &self.uri)?;
        let meta = fs.metadata(&handle);

        if matches!(format, OutputFormat::Json) {
            let mut json = serde_json::to_value(&meta)?;
            json["uri"] = serde_json::Value::String(handle.uri());
            formatter.print_json(&json);
            return Ok(());
        }

        if !meta.exists {
            formatter.warn(&format!("{} does not exist", handle.uri()));
            return Ok(());
        }

        formatter.success(&handle.uri());
        let kind = if meta.is_directory { "directory" } else { "file" };
        formatter.info(&format!("Type:   {}", kind));
        if !meta.is_directory {
            formatter.info(&format!("Length: {} bytes", meta.length));
        }
        match meta.state {
            Some(state) => formatter.info(&format!("State:  {}", state)),
            None => formatter.info("State:  -"),
        }
        Ok(())
    }
}
