//! zxfs CLI - Browse and edit traffic-manager rules as files
//!
//! Every invocation links the devices of a snapshot file (plus any hosts in
//! the configuration), refreshes them once, runs one command against the
//! `zxtm://` namespace and writes the snapshot back if a rule changed.
//!
//! ```text
//! zxfs --snapshot lab.yaml ls zxtm://lb1:9090/Rules
//! zxfs --snapshot lab.yaml put zxtm://lb1:9090/Rules/Redirect.zts --from redirect.ts
//! ```

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zxfs_core::config::Config;
use zxfs_vfs::VfsError;

mod commands;
mod output;
mod session;
mod snapshot;

use commands::{
    cat::CatCommand, ls::LsCommand, mv::MvCommand, put::PutCommand, rm::RmCommand,
    stat::StatCommand, status::StatusCommand,
};
use output::{get_formatter, OutputFormat};
use session::Session;

#[derive(Debug, Parser)]
#[command(name = "zxfs", version, about = "Traffic-manager rules as a filesystem")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Device snapshot backing the namespace
    #[arg(long)]
    snapshot: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List a directory
    Ls(LsCommand),
    /// Show metadata of a path
    Stat(StatCommand),
    /// Print a rule
    Cat(CatCommand),
    /// Write a rule from a file or stdin
    Put(PutCommand),
    /// Delete a rule
    Rm(RmCommand),
    /// Rename a rule
    Mv(MvCommand),
    /// Show the sync state of every host
    Status(StatusCommand),
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        bail!("Invalid configuration: {}", messages.join("; "));
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    // Setup tracing; -v overrides the configured level
    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from_flag(cli.json);
    let session = Session::open(&config, &cli.snapshot).await?;

    let outcome = match &cli.command {
        Commands::Ls(cmd) => cmd.execute(&session, format).await,
        Commands::Stat(cmd) => cmd.execute(&session, format).await,
        Commands::Cat(cmd) => cmd.execute(&session, format).await,
        Commands::Put(cmd) => cmd.execute(&session, format).await,
        Commands::Rm(cmd) => cmd.execute(&session, format).await,
        Commands::Mv(cmd) => cmd.execute(&session, format).await,
        Commands::Status(cmd) => cmd.execute(&session, format).await,
    };

    // Changes that reached a device are kept even if the command failed later.
    let saved = session.finish()?;
    debug!(saved, "Snapshot flushed");

    if let Err(err) = outcome {
        get_formatter(cli.json).error(&format!("{:#}", err));
        std::process::exit(exit_code(&err));
    }
    Ok(())
}

/// Exit status for a failed command: the errno of the first filesystem
/// error in the chain, 1 for anything else.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<VfsError>())
        .map(|vfs| libc::c_int::from(vfs.clone()))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_exit_code_carries_errno() {
        let err = anyhow::Error::new(VfsError::NotFound("zxtm://h1:9090/Rules/X.zts".into()));
        assert_eq!(exit_code(&err), libc::ENOENT);

        let wrapped = anyhow::Error::new(VfsError::IsDirectory("zxtm://h1:9090/Rules".into()))
            .context("cat failed");
        assert_eq!(exit_code(&wrapped), libc::EISDIR);

        assert_eq!(exit_code(&anyhow::anyhow!("bad flag")), 1);
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_put_with_from() {
        let cli = Cli::try_parse_from([
            "zxfs",
            "--snapshot",
            "lab.yaml",
            "put",
            "zxtm://h1:9090/Rules/Foo.zts",
            "--from",
            "foo.ts",
        ])
        .unwrap();
        match cli.command {
            Commands::Put(cmd) => {
                assert_eq!(cmd.uri, "zxtm://h1:9090/Rules/Foo.zts");
                assert_eq!(cmd.from, Some(PathBuf::from("foo.ts")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_is_required() {
        assert!(Cli::try_parse_from(["zxfs", "ls", "zxtm://h1:9090/"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "zxfs", "--snapshot", "s.yaml", "stat", "zxtm://h1:9090/", "--json", "-vv",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "poll:\n  interval_secs: 0\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("interval_secs"));
    }
}
