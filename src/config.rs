use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "manifest-objects";
const CONFIG_FILE: &str = "config.json";

/// Overrides `default_space`.
pub const SPACE_ENV: &str = "MANIFEST_OBJECTS_SPACE";
/// Overrides `database_path`.
pub const DATABASE_ENV: &str = "MANIFEST_OBJECTS_DB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Space used for ids that do not name one
    pub default_space: String,
    /// Interval between quiescence checks of the persistence queue
    pub queue_delay_ms: u64,
    /// SQLite database used by the command line tool
    pub database_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_space: "mct".to_string(),
            queue_delay_ms: 0,
            database_path: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the user's config directory, then apply
    /// environment overrides. Falls back to defaults if the file is missing
    /// or unreadable.
    pub fn load() -> Self {
        let config = match get_config_path().and_then(|path| Self::try_load(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    pub fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config = serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save the configuration to the user's config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(space) = std::env::var(SPACE_ENV) {
            if !space.is_empty() {
                self.default_space = space;
            }
        }
        if let Ok(path) = std::env::var(DATABASE_ENV) {
            if !path.is_empty() {
                self.database_path = Some(PathBuf::from(path));
            }
        }
        self
    }

    pub fn queue_delay(&self) -> Duration {
        Duration::from_millis(self.queue_delay_ms)
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
