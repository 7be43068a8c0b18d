//! `tasknest-server`: in-memory TaskNest API for local development.
//!
//! ```bash
//! tasknest-server --bind 0.0.0.0:3000 --token-ttl-days 1
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tasknest_server::api::{self, AppState};
use tasknest_server::config::{ServerCliArgs, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = ServerCliArgs::parse();
    let config = match ServerConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tasknest-server: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let state = Arc::new(AppState::new(config.store()));
    let (addr, handle) = match api::start_server_with_state(config.bind_addr, state).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(addr = %config.bind_addr, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        %addr,
        token_ttl_days = config.token_ttl.map(|ttl| ttl.num_days()),
        max_title_len = config.max_title_len,
        "tasknest api listening"
    );

    if let Err(e) = handle.await {
        tracing::error!(error = %e, "server task failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
