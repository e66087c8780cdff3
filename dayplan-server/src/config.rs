//! Configuration system for the Dayplan server.
//!
//! Supports layered configuration with the following priority
//! (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/dayplan/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur when loading server configuration.
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
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    weather: WeatherFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    data_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
}

/// `[weather]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct WeatherFileConfig {
    api_key: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    poll_interval_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the Dayplan server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Dayplan daily-activity planner server")]
pub struct CliArgs {
    /// Address to bind the server to.
    #[arg(short, long, env = "DAYPLAN_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/dayplan/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the task and weather files.
    #[arg(short, long, env = "DAYPLAN_DATA")]
    pub data_dir: Option<PathBuf>,

    /// Directory holding the web client's static files.
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// OpenWeather API key; weather polling is disabled without one.
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub weather_api_key: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "DAYPLAN_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved weather poller configuration.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// OpenWeather API key; `None` disables polling.
    pub api_key: Option<String>,
    /// Forecast latitude.
    pub latitude: f64,
    /// Forecast longitude.
    pub longitude: f64,
    /// Time between forecast fetches.
    pub poll_interval: Duration,
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Directory holding the task and weather files.
    pub data_dir: PathBuf,
    /// Directory holding the web client's static files.
    pub static_dir: PathBuf,
    /// Log level filter string.
    pub log_level: String,
    /// Weather poller settings.
    pub weather: WeatherConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            data_dir: PathBuf::from("data"),
            static_dir: PathBuf::from("static"),
            log_level: "info".to_string(),
            weather: WeatherConfig {
                api_key: None,
                // London, matching the original deployment.
                latitude: 51.5074,
                longitude: -0.1278,
                poll_interval: Duration::from_secs(600),
            },
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML
    /// file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. If no `--config` is given, the default path is tried and
    /// a missing file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be
    /// read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ServerConfig` from CLI args and a parsed config
    /// file. Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            data_dir: cli
                .data_dir
                .clone()
                .or_else(|| file.server.data_dir.clone())
                .unwrap_or(defaults.data_dir),
            static_dir: cli
                .static_dir
                .clone()
                .or_else(|| file.server.static_dir.clone())
                .unwrap_or(defaults.static_dir),
            log_level: cli.log_level.clone(),
            weather: WeatherConfig {
                api_key: cli
                    .weather_api_key
                    .clone()
                    .or_else(|| file.weather.api_key.clone()),
                latitude: file.weather.latitude.unwrap_or(defaults.weather.latitude),
                longitude: file.weather.longitude.unwrap_or(defaults.weather.longitude),
                poll_interval: file
                    .weather
                    .poll_interval_secs
                    .map_or(defaults.weather.poll_interval, Duration::from_secs),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
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
        config_dir.join("dayplan").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
