//! Subcommands of the `zxfs` tool
//!
//! Every command resolves its URI arguments through the session's
//! [`RuleFs`](zxfs_vfs::RuleFs) and reports through an
//! [`OutputFormatter`](crate::output::OutputFormatter).

pub mod cat;
pub mod ls;
pub mod mv;
pub mod put;
pub mod rm;
pub mod stat;
pub mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use zxfs_vfs::{RuleFs, StoreHandle};

/// Resolves `uri`, attaching it to the error on failure
fn resolve(fs: &RuleFs, uri: &str) -> Result<Arc<StoreHandle>> {
    fs.resolve(uri).with_context(|| format!("Cannot resolve {}", uri))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use zxfs_core::config::Config;

    use super::*;
    use crate::output::OutputFormat;
    use crate::session::Session;
    use crate::snapshot::Snapshot;

    const SAMPLE: &str = "devices:\n  - address: h1\n    port: 9090\n    rules:\n      Foo: bar\n";

    async fn open(dir: &tempfile::TempDir) -> (Session, PathBuf) {
        let path = dir.path().join("snapshot.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        (Session::open(&Config::default(), &path).await.unwrap(), path)
    }

    #[tokio::test]
    async fn test_read_only_commands_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = open(&dir).await;

        for format in [OutputFormat::Human, OutputFormat::Json] {
            ls::LsCommand { uri: "zxtm://h1:9090/Rules".into() }
                .execute(&session, format)
                .await
                .unwrap();
            stat::StatCommand { uri: "zxtm://h1:9090/Rules/Foo.zts".into() }
                .execute(&session, format)
                .await
                .unwrap();
            cat::CatCommand { uri: "zxtm://h1:9090/Rules/Foo.zts".into() }
                .execute(&session, format)
                .await
                .unwrap();
            status::StatusCommand {}.execute(&session, format).await.unwrap();
        }
        assert!(!session.finish().unwrap());
    }

    #[tokio::test]
    async fn test_ls_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = open(&dir).await;
        let err = ls::LsCommand { uri: "zxtm://h9:9090/Rules".into() }
            .execute(&session, OutputFormat::Human)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No such file or directory"));
    }

    #[tokio::test]
    async fn test_put_mv_rm_are_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let (session, path) = open(&dir).await;
        let source = dir.path().join("new.ts");
        std::fs::write(&source, "pool.use(\"web\");").unwrap();

        put::PutCommand {
            uri: "zxtm://h1:9090/Rules/a~cb.zts".into(),
            from: Some(source),
        }
        .execute(&session, OutputFormat::Human)
        .await
        .unwrap();
        mv::MvCommand {
            from: "zxtm://h1:9090/Rules/Foo.zts".into(),
            to: "zxtm://h1:9090/Rules/Baz.zts".into(),
        }
        .execute(&session, OutputFormat::Json)
        .await
        .unwrap();
        rm::RmCommand { uri: "zxtm://h1:9090/Rules/Baz.zts".into() }
            .execute(&session, OutputFormat::Human)
            .await
            .unwrap();
        assert!(session.finish().unwrap());

        let saved = Snapshot::load(&path).unwrap();
        let rules = &saved.devices[0].rules;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules["a:b"], "pool.use(\"web\");");
    }

    #[tokio::test]
    async fn test_cat_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = open(&dir).await;
        let err = cat::CatCommand { uri: "zxtm://h1:9090/Rules".into() }
            .execute(&session, OutputFormat::Human)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Cannot read"));
    }
}
