//! Application configuration.
//!
//! Loads config.json from the executable directory once at startup. Any
//! missing field takes its default; a missing or malformed file falls back to
//! the full default configuration. The file is never written back.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::automation::settings::AutomationSettings;
use crate::detection::{default_rank_configs, RankConfig, RankTable};

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Buffer a structured event line per reroll cycle
    pub enable_event_log: bool,
    /// Push live status to the presence reporter
    pub enable_presence: bool,
    /// How long stopping a run waits for the automation threads (ms)
    pub shutdown_timeout_ms: u64,
    /// Pause after activating the game window before rerolling starts (ms)
    pub activation_settle_ms: u64,
    /// Rank tiers, lowest quality first
    pub ranks: Vec<RankConfig>,
    /// Initial operator settings
    pub defaults: AutomationSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enable_event_log: false,
            enable_presence: false,
            shutdown_timeout_ms: 1000,
            activation_settle_ms: 100,
            ranks: default_rank_configs(),
            defaults: AutomationSettings::default(),
        }
    }
}

impl AppConfig {
    /// Builds the rank table, falling back to the default tiers if the
    /// configured list is invalid.
    pub fn rank_table(&self) -> RankTable {
        match RankTable::from_configs(&self.ranks) {
            Ok(table) => table,
            Err(e) => {
                log::warn!("Invalid rank table in config.json: {}. Using defaults.", e);
                RankTable::default()
            }
        }
    }

    /// Resets operator defaults that input validation would have rejected.
    fn validated(mut self) -> Self {
        let ranks = self.rank_table();
        for problem in self.defaults.sanitize(&ranks) {
            log::warn!("Invalid default in config.json: {}. Using the default value.", problem);
        }
        self
    }
}

/// Parses a config file, falling back to defaults on any error.
pub fn load_config_from(config_path: &Path) -> AppConfig {
    log::info!("Looking for config at: {}", config_path.display());

    if !config_path.exists() {
        log::info!("config.json not found. Using default config.");
        return AppConfig::default();
    }

    match fs::read_to_string(config_path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                log::info!("Config loaded from config.json");
                AppConfig::validated(config)
            }
            Err(e) => {
                log::warn!("Failed to parse config.json: {}. Using defaults.", e);
                AppConfig::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read config.json: {}. Using defaults.", e);
            AppConfig::default()
        }
    }
}

fn load_config() -> AppConfig {
    load_config_from(&crate::paths::get_exe_dir().join("config.json"))
}

/// Initializes the global configuration. Call once at startup, after logging.
pub fn init_config() {
    let _ = CONFIG.set(load_config());
}

/// Returns the global configuration, loading it on first use.
pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(load_config)
}
