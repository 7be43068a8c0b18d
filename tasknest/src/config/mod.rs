//! Configuration system for the `TaskNest` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/tasknest/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use tasknest_proto::{MAX_TASK_TITLE_LENGTH, Priority, SortBy, SortOrder, StatusFilter};
use url::Url;

/// Default API root when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The API base URL is not a valid http(s) URL.
    #[error("invalid API URL {url:?}: {reason}")]
    InvalidUrl {
        /// Value that was configured.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    storage: StorageFileConfig,
    tasks: TasksFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    data_dir: Option<PathBuf>,
}

/// `[tasks]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TasksFileConfig {
    max_title_len: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root URL of the task API.
    pub api_url: Url,
    /// Per-request timeout. `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
    /// Directory for the session file and the task mirror.
    pub data_dir: PathBuf,
    /// Maximum task title length in characters.
    pub max_title_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout: None,
            data_dir: default_data_dir(),
            max_title_len: MAX_TASK_TITLE_LENGTH,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path (`~/.config/tasknest/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or if the resulting API URL is invalid.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. This is separated from `load()` to
    /// enable unit testing without CLI parsing.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = match cli.api_url.as_deref().or(file.api.base_url.as_deref()) {
            Some(raw) => parse_api_url(raw)?,
            None => defaults.api_url,
        };

        Ok(Self {
            api_url,
            request_timeout: cli
                .timeout_secs
                .or(file.api.request_timeout_secs)
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
            data_dir: cli
                .data_dir
                .clone()
                .or_else(|| file.storage.data_dir.clone())
                .unwrap_or(defaults.data_dir),
            max_title_len: file.tasks.max_title_len.unwrap_or(defaults.max_title_len),
        })
    }
}

/// Parses and checks an API base URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUrl`] unless `raw` is an absolute http(s) URL.
pub fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

#[allow(clippy::expect_used)]
fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("DEFAULT_API_URL is a valid URL")
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tasknest")
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Personal task manager backed by a remote todo API")]
pub struct CliArgs {
    /// Root URL of the task API.
    #[arg(long, env = "TASKNEST_API_URL")]
    pub api_url: Option<String>,

    /// Per-request timeout in seconds (0 disables).
    #[arg(long, env = "TASKNEST_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Directory for the session and the local task mirror.
    #[arg(long, env = "TASKNEST_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to config file (default: `~/.config/tasknest/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKNEST_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/tasknest.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKNEST_PASSWORD")]
        password: String,
    },
    /// Sign in and store the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKNEST_PASSWORD")]
        password: String,
    },
    /// Forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// List tasks through the filter and search.
    List(ListArgs),
    /// Show one task.
    Show { id: String },
    /// Create a task.
    Add(AddArgs),
    /// Edit fields of a task.
    Edit(EditArgs),
    /// Flip a task between active and completed.
    Toggle { id: String },
    /// Delete a task.
    Rm { id: String },
    /// Move the task at one position of the listed view to another.
    Move {
        from: usize,
        to: usize,
        #[command(flatten)]
        view: ListArgs,
    },
    /// List every tag in use.
    Tags,
    /// Show completion statistics.
    Stats(ListArgs),
}

/// View selection shared by `list`, `move` and `stats`.
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    /// all, active or completed.
    #[arg(long)]
    pub status: Option<StatusFilter>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub tag: Option<String>,
    /// dueDate, priority, created or title.
    #[arg(long)]
    pub sort: Option<SortBy>,
    /// asc or desc.
    #[arg(long)]
    pub order: Option<SortOrder>,
    /// Free-text search over title, description and tags.
    #[arg(long, short)]
    pub search: Option<String>,
}

/// Fields for `add`.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    pub title: String,
    #[arg(long, short)]
    pub description: Option<String>,
    #[arg(long, short)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub category: Option<String>,
    /// Repeatable.
    #[arg(long = "tag", short)]
    pub tags: Vec<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    #[arg(long)]
    pub due: Option<String>,
}

/// Fields for `edit`. Empty strings clear optional fields.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub category: Option<String>,
    /// Replaces all tags. Repeatable.
    #[arg(long = "tag")]
    pub tags: Option<Vec<String>>,
    #[arg(long)]
    pub due: Option<String>,
    #[arg(long)]
    pub completed: Option<bool>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("tasknest").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
