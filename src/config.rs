//! Configuration file support
//!
//! Loads settings from `~/.sshterm/config.toml`

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn, Level};

use crate::core::term::{Palette, Screen};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default remote host
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    /// Private key passed to ssh with `-i`
    pub identity_file: Option<PathBuf>,
    /// ssh client executable
    pub ssh_command: String,
    /// trace, debug, info, warn or error
    pub log_level: String,
    pub terminal: TerminalConfig,
    pub colors: ColorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            user: None,
            identity_file: None,
            ssh_command: "ssh".to_string(),
            log_level: "info".to_string(),
            terminal: TerminalConfig::default(),
            colors: ColorConfig::default(),
        }
    }
}

/// Fallback geometry when the hosting terminal cannot report its size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            cols: Screen::DEFAULT_COLS,
            rows: Screen::DEFAULT_ROWS,
        }
    }
}

/// Palette indices of the default colours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub foreground: u8,
    pub background: u8,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            foreground: Palette::DEFAULT_FOREGROUND,
            background: Palette::DEFAULT_BACKGROUND,
        }
    }
}

impl Config {
    /// Load from the default location. A missing file gives defaults, and so
    /// does a broken one after a warning.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => {
                info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                warn!("Ignoring {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// `~/.sshterm`
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".sshterm"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    pub fn palette(&self) -> Palette {
        Palette::new(self.colors.foreground, self.colors.background)
    }

    /// Configured log level, INFO when unrecognised
    pub fn log_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

/// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
