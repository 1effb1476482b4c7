//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// API base URL used when neither the config file nor a flag sets one
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Configuration for the dataforge CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// DataForge API base URL
    pub base_url: Option<String>,
    /// Default AI provider sent with each message
    pub ai_provider: Option<String>,
    /// Ask for a reasoning trace by default
    pub use_deep_thinking: Option<bool>,
    /// Give up connecting after this many seconds
    pub connect_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dataforge")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("DATAFORGE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse config file content
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            ai_provider: None,
            use_deep_thinking: Some(false),
            connect_timeout_secs: Some(10),
        };

        default_config.save()?;
        Ok(path)
    }

    /// Base URL, falling back to the built-in default
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Connect timeout, if configured
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# dataforge configuration file
# Place at ~/.config/dataforge/config.toml (Linux/Mac) or %APPDATA%\dataforge\config.toml (Windows)

# DataForge API base URL
base_url = "http://localhost:8000/api"

# AI provider to request (server default when omitted)
# ai_provider = "deepseek"

# Request a reasoning trace with every message
use_deep_thinking = false

# Connect timeout in seconds
connect_timeout_secs = 10
"#
}
