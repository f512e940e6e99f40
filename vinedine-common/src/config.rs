//! Bootstrap configuration loading and root folder resolution
//!
//! Settings come from a TOML file whose every field has a compiled default,
//! so a missing or partial file never prevents startup. Secrets and the root
//! folder may additionally be overridden from the environment; that
//! resolution lives with the service that consumes them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "VINEDINE_ROOT_FOLDER";

/// File name of the SQLite database inside the root folder
pub const DATABASE_FILE_NAME: &str = "vinedine.db";

/// Bootstrap configuration loaded from `vinedine.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database (optional, see [`RootFolderResolver`])
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub catalog: CatalogConfig,
    pub retry: RetryConfig,
    pub pipeline: PipelineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins over this.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5740".to_string(),
        }
    }
}

/// Text-generation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub base_url: String,
    pub model: String,
    /// Sampling temperature, clamped to [0, 1] on use
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.5,
            max_tokens: 500,
            api_key: None,
        }
    }
}

/// Music-catalog service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub api_base_url: String,
    pub token_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Market (ISO 3166-1 alpha-2) used to scope searches
    pub market: String,
    /// Client-side request quota
    pub requests_per_second: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            client_id: None,
            client_secret: None,
            market: "ZA".to_string(),
            requests_per_second: 5,
        }
    }
}

/// Retry and deadline settings shared by both external clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Deadline applied to every individual external call
    pub call_deadline_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
            call_deadline_secs: 60,
        }
    }
}

/// Orchestration choices
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// "genre_playlist" or "recipe_hint"
    pub song_selection: String,
    /// "concurrent" or "sequential"
    pub dispatch: String,
    /// Fixes every random draw (genre, playlist order, track) when set
    pub rng_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            song_selection: "genre_playlist".to_string(),
            dispatch: "concurrent".to_string(),
            rng_seed: None,
        }
    }
}

/// Parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Per-user configuration file location (`~/.config/vinedine/vinedine.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vinedine").join("vinedine.toml"))
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// File named on the command line or in `VINEDINE_CONFIG`
    Explicit(PathBuf),
    /// Per-user file at [`default_config_path`]
    UserFile(PathBuf),
    /// No file found
    CompiledDefaults,
}

impl ConfigSource {
    /// Log the source at the level the outcome deserves
    ///
    /// Called once the tracing subscriber is installed, since the configured
    /// log level is only known after loading.
    pub fn log(&self) {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::UserFile(path) => {
                info!("Configuration loaded from {}", path.display())
            }
            ConfigSource::CompiledDefaults => {
                warn!("No configuration file found, using compiled defaults")
            }
        }
    }
}

/// Load configuration with graceful degradation
///
/// An explicitly requested file must exist and parse. Otherwise the per-user
/// file is used when present, and compiled defaults when it is not.
pub fn load_config(explicit: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    load_config_from(explicit, default_config_path())
}

/// [`load_config`] with the per-user file location supplied by the caller
pub fn load_config_from(
    explicit: Option<&Path>,
    user_file: Option<PathBuf>,
) -> Result<(TomlConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let config = load_toml_config(path)?;
        return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
    }

    match user_file {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            Ok((config, ConfigSource::UserFile(path)))
        }
        _ => Ok((TomlConfig::default(), ConfigSource::CompiledDefaults)),
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `VINEDINE_ROOT_FOLDER` environment variable
/// 3. `root_folder` from the TOML file
/// 4. OS-dependent compiled default
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml_value: Option<PathBuf>) -> Self {
        Self { cli_arg, toml_value }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        default_root_folder()
    }
}

/// OS-dependent default root folder (`~/.local/share/vinedine` on Linux)
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vinedine"))
        .unwrap_or_else(|| PathBuf::from("./vinedine_data"))
}

/// Prepares the root folder on first run
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}
