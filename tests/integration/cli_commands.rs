//! Integration tests for CLI command dispatch against an in-process server.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;

use clap::Parser;

use tasknest::app::{self, AppError};
use tasknest::config::{CliArgs, ClientConfig, Command, parse_api_url};

struct Harness {
    config: ClientConfig,
    server: tokio::task::JoinHandle<()>,
}

impl Harness {
    async fn start(name: &str) -> Self {
        let (addr, server) = tasknest_server::api::start_server("127.0.0.1:0")
            .await
            .expect("failed to start test server");
        let data_dir: PathBuf = std::env::temp_dir()
            .join(format!("tasknest-cli-{name}-{}", uuid::Uuid::now_v7()));
        let config = ClientConfig {
            api_url: parse_api_url(&format!("http://{addr}")).unwrap(),
            data_dir,
            ..ClientConfig::default()
        };
        Self { config, server }
    }

    async fn run(&self, args: &[&str]) -> Result<String, AppError> {
        let cli = CliArgs::parse_from(std::iter::once("tasknest").chain(args.iter().copied()));
        let command: Command = cli.command.expect("subcommand");
        let mut out = Vec::new();
        app::run(&self.config, command, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn finish(self) {
        let _ = std::fs::remove_dir_all(&self.config.data_dir);
        self.server.abort();
    }
}

#[tokio::test]
async fn full_session() {
    let h = Harness::start("full").await;

    let out = h
        .run(&[
            "register", "--name", "Ada", "--email", "ada@example.com", "--password", "pw",
        ])
        .await
        .unwrap();
    assert!(out.contains("Ada <ada@example.com>"));

    let out = h
        .run(&["add", "Buy milk", "--priority", "low", "--tag", "home"])
        .await
        .unwrap();
    assert!(out.starts_with("Added "));
    assert!(out.contains("[ok] Task created: Your task has been added successfully"));
    let id = out
        .lines()
        .next()
        .and_then(|l| l.strip_prefix("Added "))
        .unwrap()
        .to_string();

    h.run(&["add", "Ship it", "--priority", "high", "--due", "2030-01-01"])
        .await
        .unwrap();

    let out = h.run(&["list", "--sort", "priority"]).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines[0].contains("Ship it"));
    assert!(lines[1].contains("Buy milk"));

    let out = h.run(&["toggle", &id]).await.unwrap();
    assert!(out.starts_with("Buy milk is now completed"));

    let out = h.run(&["list", "--status", "active"]).await.unwrap();
    assert!(!out.contains("Buy milk"));
    let out = h.run(&["list", "--status", "completed"]).await.unwrap();
    assert!(out.contains("[x] Buy milk"));

    let out = h.run(&["tags"]).await.unwrap();
    assert_eq!(out.trim(), "home");

    let out = h.run(&["stats"]).await.unwrap();
    assert!(out.contains("total:     2"));
    assert!(out.contains("completed: 1 (50%)"));

    let out = h.run(&["edit", &id, "--title", "Buy oat milk"]).await.unwrap();
    assert!(out.contains("title:       Buy oat milk"));

    let out = h.run(&["rm", &id]).await.unwrap();
    assert!(out.starts_with(&format!("Deleted {id}")));

    let out = h.run(&["whoami"]).await.unwrap();
    assert!(out.starts_with("Ada <ada@example.com>"));

    h.run(&["logout"]).await.unwrap();
    let err = h.run(&["list"]).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Auth(tasknest::auth::AuthError::NotSignedIn)
    ));

    h.finish();
}

#[tokio::test]
async fn validation_errors_are_reported() {
    let h = Harness::start("validation").await;
    h.run(&[
        "register", "--name", "Bo", "--email", "bo@example.com", "--password", "pw",
    ])
    .await
    .unwrap();

    let err = h.run(&["add", "   "]).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Task(tasknest::tasks::TaskError::TitleEmpty)
    ));

    let err = h.run(&["toggle", "ghost"]).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Task(tasknest::tasks::TaskError::NotFound(_))
    ));

    let err = h.run(&["add", "dated", "--due", "someday"]).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidDate(_)));

    let err = h.run(&["move", "1", "2"]).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Task(tasknest::tasks::TaskError::InvalidIndex { .. })
    ));

    h.finish();
}
