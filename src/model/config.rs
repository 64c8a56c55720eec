use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration from tasktree/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Blob key the forest is saved under
    #[serde(default = "default_key")]
    pub key: String,
    /// Populate the seed dataset when no blob exists yet
    #[serde(default = "default_true")]
    pub seed_on_empty: bool,
    /// Attempts per save before the save is left pending
    #[serde(default = "default_save_retries")]
    pub save_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            key: default_key(),
            seed_on_empty: true,
            save_retries: default_save_retries(),
        }
    }
}

fn default_key() -> String {
    "tasks".to_string()
}

fn default_true() -> bool {
    true
}

fn default_save_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub show_key_hints: bool,
    /// `"#RRGGBB"` overrides keyed by theme slot name
    #[serde(default)]
    pub colors: HashMap<String, String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            show_key_hints: true,
            colors: HashMap::new(),
        }
    }
}
