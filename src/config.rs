use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::DEFAULT_CATEGORIES;
use crate::offline::AgentConfig;

const LOCAL_CONFIG: &str = "predger.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local storage key the ledger snapshot lives under.
    pub storage_key: String,
    /// Categories offered when adding an item, in selector order.
    pub categories: Vec<String>,
    pub cache: AgentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_key: "predger.items".into(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            cache: AgentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Search order:
    /// 1. Explicit path if provided (must exist)
    /// 2. ./predger.yaml
    /// 3. config.yaml in the platform config directory
    ///
    /// Built-in defaults apply when no file is found.
    pub fn load(explicit_path: Option<&Path>, config_dir: Option<&Path>) -> Result<Self> {
        let path = match explicit_path {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => bail!("Config file not found: {}", p.display()),
            None => Self::find_config_file(config_dir),
        };

        let config = match path {
            Some(p) => Self::load_from_path(&p)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn find_config_file(config_dir: Option<&Path>) -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            return Some(local);
        }

        let user = config_dir?.join("config.yaml");
        user.exists().then_some(user)
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            bail!("storage_key must not be empty");
        }
        if self.categories.iter().all(|c| c.trim().is_empty()) {
            bail!("At least one category is required");
        }
        if self.cache.version.trim().is_empty() {
            bail!("cache.version must not be empty");
        }
        self.cache
            .origin_url()
            .with_context(|| format!("Invalid cache.origin '{}'", self.cache.origin))?;
        Ok(())
    }
}
