//! Runtime configuration.
//!
//! Loaded from `--config <path>` or `academic-progress.toml` in the current
//! directory; a missing default file means built-in defaults. `DATABASE_URL`
//! overrides the configured connection string.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::risk::ProgressionThresholds;

pub const DEFAULT_CONFIG_FILE: &str = "academic-progress.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub progression: ProgressionThresholds,
}

fn default_log_filter() -> String {
    "academic_progress=info".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            log_filter: default_log_filter(),
            max_connections: default_max_connections(),
            progression: ProgressionThresholds::default(),
        }
    }
}

impl AppConfig {
    /// Connection string, or an error naming both places it can come from.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().context(
            "DATABASE_URL must be set (or database_url in the config file) to a Postgres instance",
        )
    }

    fn apply_env(&mut self, database_url: Option<String>) {
        if let Some(url) = database_url.filter(|url| !url.trim().is_empty()) {
            self.database_url = Some(url);
        }
    }

    fn validate(&self) -> Result<()> {
        let rate = self.progression.min_pass_rate;
        if !(0.0..=1.0).contains(&rate) {
            anyhow::bail!("progression.min_pass_rate must be between 0 and 1, got {rate}");
        }
        if self.max_connections == 0 {
            anyhow::bail!("max_connections must be at least 1");
        }
        Ok(())
    }
}

/// Load config from an explicit path, or the default file if present.
pub fn load_config_from(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|local| local.exists()),
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<AppConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AppConfig::default(),
    };

    config.apply_env(std::env::var("DATABASE_URL").ok());
    config.validate()?;
    Ok(config)
}
