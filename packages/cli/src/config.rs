use mapedit_editor::HistoryConfig;
use mapedit_graph::TreeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "mapedit.config.json";

/// Mapedit configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Where autosave blobs go, relative to the config file
    #[serde(default = "default_backup_path")]
    pub backup_path: String,

    /// Default log filter when `RUST_LOG` is unset (e.g. "info", "mapedit_graph=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub tree: TreeConfig,
}

fn default_backup_path() -> String {
    ".mapedit/history.json".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &Path) -> anyhow::Result<Self> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn get_backup_path(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.backup_path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_path: default_backup_path(),
            log_level: default_log_level(),
            history: HistoryConfig::default(),
            tree: TreeConfig::default(),
        }
    }
}
