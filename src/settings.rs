//! Process configuration read from the environment

use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3002;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("FLOWRELAY_PORT must be a port number, got {0:?}")]
    InvalidPort(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    /// Directory of `*.json` configurations; built-in samples when unset
    pub config_dir: Option<PathBuf>,
    /// Empty means any origin
    pub allowed_origins: Vec<String>,
    /// Empty means any non-empty token
    pub tokens: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            config_dir: None,
            allowed_origins: Vec::new(),
            tokens: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let port = match lookup("FLOWRELAY_PORT").filter(|p| !p.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| SettingsError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let config_dir = lookup("FLOWRELAY_CONFIG_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);

        let allowed_origins = lookup("FLOWRELAY_ALLOWED_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default()
            .into_iter()
            .filter(|origin| origin != "*")
            .collect();

        let tokens = lookup("FLOWRELAY_TOKENS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            port,
            config_dir,
            allowed_origins,
            tokens,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
