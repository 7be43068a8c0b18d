//! `TaskNest`: personal task manager backed by a remote todo API.
//!
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/tasknest/config.toml`).
//!
//! ```bash
//! cargo run --bin tasknest -- --api-url http://127.0.0.1:8080 login \
//!     --email ada@example.com --password secret
//! cargo run --bin tasknest -- add "Buy milk" --priority high --tag home
//! cargo run --bin tasknest -- list --status active --sort dueDate --order asc
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_appender::non_blocking::WorkerGuard;

use tasknest::app;
use tasknest::config::{CliArgs, ClientConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    // Logs go to a file so command output on stdout stays clean.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let Some(command) = cli.command else {
        let _ = CliArgs::command().print_help();
        return ExitCode::SUCCESS;
    };

    tracing::info!(api_url = %config.api_url, "tasknest starting");

    let mut stdout = std::io::stdout().lock();
    match app::run(&config, command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = %e.kind(), error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("tasknest.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
