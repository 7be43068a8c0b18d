//! Server settings.
//!
//! Values come from flags (or their env vars), then the `[server]`, `[auth]`
//! and `[tasks]` sections of `~/.config/tasknest-server/config.toml`, then
//! the defaults below. Everything is validated once at startup so a bad
//! address or limit fails before the listener binds.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;

use tasknest_proto::MAX_TASK_TITLE_LENGTH;

use crate::store::ServerStore;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Days a bearer token stays valid unless configured otherwise.
pub const DEFAULT_TOKEN_TTL_DAYS: u32 = 7;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("invalid bind address {addr:?}: {source}")]
    InvalidBindAddr {
        addr: String,
        source: std::net::AddrParseError,
    },

    #[error("max_title_len must be at least 1")]
    ZeroTitleLength,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLayer {
    server: ServerSection,
    auth: AuthSection,
    tasks: TasksSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerSection {
    bind_addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AuthSection {
    /// `0` issues tokens that never expire.
    token_ttl_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TasksSection {
    max_title_len: Option<usize>,
}

#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "TaskNest reference API server")]
pub struct ServerCliArgs {
    /// Address to listen on.
    #[arg(short, long, env = "TASKNEST_ADDR")]
    pub bind: Option<String>,

    /// Config file (default: `~/.config/tasknest-server/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Days a login token stays valid; 0 never expires.
    #[arg(long, env = "TASKNEST_TOKEN_TTL_DAYS")]
    pub token_ttl_days: Option<u32>,

    /// Maximum task title length in characters.
    #[arg(long)]
    pub max_title_len: Option<usize>,

    #[arg(long, default_value = "info", env = "TASKNEST_SERVER_LOG")]
    pub log_level: String,
}

/// Validated server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// `None` when tokens never expire.
    pub token_ttl: Option<Duration>,
    pub max_title_len: usize,
    pub log_level: String,
}

impl ServerConfig {
    /// Reads the config file and merges it under the CLI arguments.
    ///
    /// An explicit `--config` must exist; the default path may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// resolved value is invalid.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let layer = match &cli.config {
            Some(path) => read_layer(path)?,
            None => default_path()
                .map(|path| read_optional_layer(&path))
                .transpose()?
                .unwrap_or_default(),
        };
        Self::resolve(cli, layer)
    }

    fn resolve(cli: &ServerCliArgs, file: FileLayer) -> Result<Self, ConfigError> {
        let addr = cli
            .bind
            .clone()
            .or(file.server.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = addr
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr { addr, source })?;

        let ttl_days = cli
            .token_ttl_days
            .or(file.auth.token_ttl_days)
            .unwrap_or(DEFAULT_TOKEN_TTL_DAYS);
        let token_ttl = (ttl_days > 0).then(|| Duration::days(i64::from(ttl_days)));

        let max_title_len = cli
            .max_title_len
            .or(file.tasks.max_title_len)
            .unwrap_or(MAX_TASK_TITLE_LENGTH);
        if max_title_len == 0 {
            return Err(ConfigError::ZeroTitleLength);
        }

        Ok(Self {
            bind_addr,
            token_ttl,
            max_title_len,
            log_level: cli.log_level.clone(),
        })
    }

    /// An empty store enforcing these limits.
    #[must_use]
    pub fn store(&self) -> ServerStore {
        ServerStore::with_max_title_len(self.max_title_len).with_token_ttl(self.token_ttl)
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tasknest-server").join("config.toml"))
}

fn read_layer(path: &Path) -> Result<FileLayer, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}

fn read_optional_layer(path: &Path) -> Result<FileLayer, ConfigError> {
    match read_layer(path) {
        Err(ConfigError::ReadFile { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            Ok(FileLayer::default())
        }
        other => other,
    }
}
