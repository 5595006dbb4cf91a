//! In-memory catalog of bot configurations

use super::config::{BotConfiguration, ConfigError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

const SAMPLES: &str = include_str!("samples.json");

/// Whether an import added a configuration or replaced one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    Created,
    Updated,
}

/// A file may hold one configuration or an exported list of them
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    Many(Vec<BotConfiguration>),
    One(Box<BotConfiguration>),
}

/// Parse and normalize every configuration in a JSON document
pub fn parse_document(text: &str) -> Result<Vec<BotConfiguration>, ConfigError> {
    let configs = match serde_json::from_str::<ConfigDocument>(text)? {
        ConfigDocument::Many(configs) => configs,
        ConfigDocument::One(config) => vec![*config],
    };
    configs.into_iter().map(BotConfiguration::normalize).collect()
}

/// Ordered set of configurations, keyed by id
pub struct ConfigCatalog {
    configs: RwLock<Vec<Arc<BotConfiguration>>>,
}

impl ConfigCatalog {
    pub fn new(configs: Vec<BotConfiguration>) -> Self {
        let mut ordered: Vec<Arc<BotConfiguration>> = Vec::with_capacity(configs.len());
        for config in configs {
            if let Some(slot) = ordered.iter_mut().find(|c| c.id == config.id) {
                tracing::warn!(config_id = %config.id, "Duplicate configuration id, keeping the later one");
                *slot = Arc::new(config);
            } else {
                ordered.push(Arc::new(config));
            }
        }
        Self {
            configs: RwLock::new(ordered),
        }
    }

    /// Catalog seeded with the built-in sample bots
    pub fn with_samples() -> Result<Self, ConfigError> {
        Ok(Self::new(parse_document(SAMPLES)?))
    }

    /// Load every `*.json` file in `dir`, in file-name order
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut configs = Vec::new();
        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let loaded = parse_document(&text)?;
            tracing::info!(path = %path.display(), count = loaded.len(), "Loaded configurations");
            configs.extend(loaded);
        }

        Ok(Self::new(configs))
    }

    pub async fn list(&self) -> Vec<Arc<BotConfiguration>> {
        self.configs.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<BotConfiguration>> {
        self.configs.read().await.iter().find(|c| c.id == id).cloned()
    }

    /// First active configuration, or the first one at all
    pub async fn default_config(&self) -> Option<Arc<BotConfiguration>> {
        let configs = self.configs.read().await;
        configs
            .iter()
            .find(|c| c.is_active)
            .or_else(|| configs.first())
            .cloned()
    }

    /// Add a configuration, or replace the one with the same id and stamp
    /// its `updatedAt`
    pub async fn import(
        &self,
        config: BotConfiguration,
    ) -> Result<(ImportOutcome, Arc<BotConfiguration>), ConfigError> {
        let mut config = config.normalize()?;
        let mut configs = self.configs.write().await;

        if let Some(slot) = configs.iter_mut().find(|c| c.id == config.id) {
            config.updated_at = Utc::now();
            let config = Arc::new(config);
            *slot = Arc::clone(&config);
            tracing::info!(config_id = %config.id, "Configuration updated");
            return Ok((ImportOutcome::Updated, config));
        }

        let config = Arc::new(config);
        configs.push(Arc::clone(&config));
        tracing::info!(config_id = %config.id, "Configuration created");
        Ok((ImportOutcome::Created, config))
    }

    /// Import every configuration in a document. Nothing is stored unless
    /// all of them validate.
    pub async fn import_document(
        &self,
        text: &str,
    ) -> Result<Vec<(ImportOutcome, Arc<BotConfiguration>)>, ConfigError> {
        let configs = parse_document(text)?;
        let mut imported = Vec::with_capacity(configs.len());
        for config in configs {
            imported.push(self.import(config).await?);
        }
        Ok(imported)
    }

    pub async fn remove(&self, id: &str) -> bool {
        let mut configs = self.configs.write().await;
        let before = configs.len();
        configs.retain(|c| c.id != id);
        before != configs.len()
    }

    pub async fn len(&self) -> usize {
        self.configs.read().await.len()
    }
}
