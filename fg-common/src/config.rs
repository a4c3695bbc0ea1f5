//! Configuration loading
//!
//! Settings are resolved field by field in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never prevents startup; it is logged
//! and the remaining sources are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable overriding the scoring backend base URL
pub const ENV_API_URL: &str = "FG_API_URL";
/// Environment variable overriding the session storage directory
pub const ENV_SESSION_DIR: &str = "FG_SESSION_DIR";
/// Environment variable overriding the history capacity
pub const ENV_HISTORY_CAPACITY: &str = "FG_HISTORY_CAPACITY";

/// Default number of screenings kept in history
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Compiled defaults, used when no other source provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub api_url: String,
    pub history_capacity: usize,
    pub session_dir: PathBuf,
    pub abort_superseded: bool,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            session_dir: std::env::temp_dir().join("fraudguard").join("session"),
            abort_superseded: false,
            log_level: "info".to_string(),
        }
    }
}

/// Settings read from `config.toml`; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Scoring backend base URL
    #[serde(default)]
    pub api_url: Option<String>,

    /// Maximum number of history entries
    #[serde(default)]
    pub history_capacity: Option<usize>,

    /// Directory backing session storage
    #[serde(default)]
    pub session_dir: Option<PathBuf>,

    /// Abort superseded scoring calls instead of letting them finish
    #[serde(default)]
    pub abort_superseded: Option<bool>,

    /// Per-call HTTP timeout; no timeout when absent
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub history_capacity: Option<usize>,
    pub session_dir: Option<PathBuf>,
    pub abort_superseded: Option<bool>,
    pub log_level: Option<String>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    /// Base URL without trailing slash
    pub api_url: String,
    pub history_capacity: usize,
    pub session_dir: PathBuf,
    pub abort_superseded: bool,
    pub request_timeout: Option<Duration>,
    pub log_level: String,
}

/// Resolves a `ScreenConfig` from CLI, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    config_file: Option<PathBuf>,
}

impl ConfigResolver {
    /// Resolver using the platform config file location
    pub fn new() -> Self {
        Self { config_file: None }
    }

    /// Resolver reading an explicit config file
    pub fn with_config_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_file: Some(path.into()),
        }
    }

    /// Resolve every setting
    pub fn resolve(&self, cli: &CliOverrides) -> Result<ScreenConfig> {
        let defaults = CompiledDefaults::for_current_platform();
        let toml = self.load_toml();

        let api_url = cli
            .api_url
            .clone()
            .or_else(|| env_string(ENV_API_URL))
            .or(toml.api_url)
            .unwrap_or(defaults.api_url);

        let history_capacity = cli
            .history_capacity
            .or_else(env_capacity)
            .or(toml.history_capacity)
            .unwrap_or(defaults.history_capacity);

        let session_dir = cli
            .session_dir
            .clone()
            .or_else(|| env_string(ENV_SESSION_DIR).map(PathBuf::from))
            .or(toml.session_dir)
            .unwrap_or(defaults.session_dir);

        let abort_superseded = cli
            .abort_superseded
            .or(toml.abort_superseded)
            .unwrap_or(defaults.abort_superseded);

        let log_level = cli
            .log_level
            .clone()
            .or(toml.logging.level)
            .unwrap_or(defaults.log_level);

        let config = ScreenConfig {
            api_url: normalize_api_url(&api_url)?,
            history_capacity,
            session_dir,
            abort_superseded,
            request_timeout: toml.request_timeout_secs.map(Duration::from_secs),
            log_level,
        };
        config.validate()?;
        Ok(config)
    }

    fn load_toml(&self) -> TomlConfig {
        let path = match self.config_file.clone().or_else(default_config_path) {
            Some(path) => path,
            None => {
                debug!("No config file location available, using defaults");
                return TomlConfig::default();
            }
        };

        if !path.exists() {
            if self.config_file.is_some() {
                warn!("Config file {} not found, using defaults", path.display());
            } else {
                debug!("No config file at {}", path.display());
            }
            return TomlConfig::default();
        }

        match TomlConfig::load(&path) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                TomlConfig::default()
            }
        }
    }
}

impl ScreenConfig {
    /// Reject settings the screening components cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(Error::Config("history_capacity must be at least 1".to_string()));
        }
        if let Some(timeout) = self.request_timeout {
            if timeout.is_zero() {
                return Err(Error::Config("request_timeout_secs must be positive".to_string()));
            }
        }
        Ok(())
    }
}

/// Platform config file: `<config_dir>/fraudguard/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fraudguard").join("config.toml"))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_capacity() -> Option<usize> {
    let raw = env_string(ENV_HISTORY_CAPACITY)?;
    match raw.trim().parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a non-negative integer", ENV_HISTORY_CAPACITY, raw);
            None
        }
    }
}

fn normalize_api_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "api_url must start with http:// or https://, got {:?}",
            raw
        )));
    }
    Ok(trimmed.to_string())
}
