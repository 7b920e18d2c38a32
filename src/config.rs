//! Layered configuration for chatdb.
//!
//! Sources, lowest priority first:
//!
//! 1. **Compiled defaults**
//! 2. **User config file** - `~/.config/chatdb/config.toml`
//! 3. **Environment variables** - `CHATDB_*` prefix
//! 4. **CLI arguments**
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! db = "~/Library/Messages/chat.db"
//!
//! [history]
//! default_limit = 50
//!
//! [watch]
//! debounce_ms = 250
//! batch_limit = 100
//! stat_interval_ms = 200
//! recheck_interval_ms = 30000
//! repoll_on_full_batch = false
//!
//! [output]
//! format = "text"
//! colors = true
//! ```

use crate::error::{ChatDbError, Result, ResultExt};
use crate::model::StartFrom;
use crate::watcher::{
    DEFAULT_BATCH_LIMIT, DEFAULT_DEBOUNCE, DEFAULT_STAT_INTERVAL, DEFAULT_RECHECK_INTERVAL,
    WatchOptions,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub history: HistoryConfig,
    pub watch: WatchConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Message store to read.
    /// Environment variable: `CHATDB_DB`
    pub db: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Messages returned by `history` when no limit is given.
    /// Environment variable: `CHATDB_LIMIT`
    pub default_limit: usize,
}

/// Live feed tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Environment variable: `CHATDB_DEBOUNCE_MS`
    pub debounce_ms: u64,
    /// Environment variable: `CHATDB_BATCH_LIMIT`
    pub batch_limit: usize,
    pub stat_interval_ms: u64,
    /// 0 disables the periodic re-check.
    pub recheck_interval_ms: u64,
    /// Environment variable: `CHATDB_REPOLL`
    pub repoll_on_full_batch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `text`, `json` or `jsonl`.
    /// Environment variable: `CHATDB_FORMAT`
    pub format: String,
    /// Disabled by `CHATDB_NO_COLOR` or `NO_COLOR`.
    pub colors: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { default_limit: 50 }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: duration_ms(DEFAULT_DEBOUNCE),
            batch_limit: DEFAULT_BATCH_LIMIT,
            stat_interval_ms: duration_ms(DEFAULT_STAT_INTERVAL),
            recheck_interval_ms: duration_ms(DEFAULT_RECHECK_INTERVAL),
            repoll_on_full_batch: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            colors: true,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl WatchConfig {
    /// Session options for `chat_id` starting at `start`.
    #[must_use]
    pub fn to_options(&self, chat_id: Option<i64>, start: StartFrom) -> WatchOptions {
        WatchOptions {
            chat_id,
            start,
            debounce: Duration::from_millis(self.debounce_ms),
            batch_limit: self.batch_limit,
            stat_interval: Duration::from_millis(self.stat_interval_ms),
            recheck_interval: Duration::from_millis(self.recheck_interval_ms),
            repoll_on_full_batch: self.repoll_on_full_batch,
            max_messages: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, the user file, and the environment.
    ///
    /// A user file that cannot be read or parsed is skipped with a warning.
    #[must_use]
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(path) = Self::user_config_path() {
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(user) => config.merge(user),
                    Err(e) => warn!("Ignoring config file: {e}"),
                }
            } else {
                debug!("Config file not found: {}", path.display());
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok());
        debug!("Configuration loaded: {:?}", config);
        config
    }

    /// Load an explicit configuration file, then apply the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ChatDbError::ConfigError`] if the file cannot be read or
    /// parsed.
    pub fn load_with_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge(Self::load_from_file(path)?);
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse one configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ChatDbError::ConfigError`] if the file cannot be read or
    /// parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ChatDbError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = toml::from_str(&content).map_err(|e| ChatDbError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Standard location of the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chatdb").join("config.toml"))
    }

    /// Apply `CHATDB_*` overrides read through `var`.
    ///
    /// Unparsable numeric values are ignored with a warning.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(db) = var("CHATDB_DB") {
            self.paths.db = Some(PathBuf::from(db));
        }
        if let Some(limit) = parse_env(&var, "CHATDB_LIMIT") {
            self.history.default_limit = limit;
        }
        if let Some(ms) = parse_env(&var, "CHATDB_DEBOUNCE_MS") {
            self.watch.debounce_ms = ms;
        }
        if let Some(limit) = parse_env(&var, "CHATDB_BATCH_LIMIT") {
            self.watch.batch_limit = limit;
        }
        if let Some(repoll) = parse_env(&var, "CHATDB_REPOLL") {
            self.watch.repoll_on_full_batch = repoll;
        }
        if let Some(format) = var("CHATDB_FORMAT") {
            self.output.format = format;
        }
        if var("CHATDB_NO_COLOR").is_some() || var("NO_COLOR").is_some() {
            self.output.colors = false;
        }
    }

    /// Merge another config into this one (other takes precedence).
    fn merge(&mut self, other: Self) {
        if other.paths.db.is_some() {
            self.paths.db = other.paths.db;
        }
        self.history = other.history;
        self.watch = other.watch;
        self.output = other.output;
    }

    /// Configured store path, or the platform default.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths
            .db
            .as_deref()
            .map_or_else(crate::default_db_path, expand_home)
    }

    /// Write the current configuration to the user config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined,
    /// the parent directory cannot be created, or the file cannot be written.
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::user_config_path().ok_or_else(|| {
            ChatDbError::invalid_argument("could not determine config directory")
        })?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Write the current configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the file
    /// cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ChatDbError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Default configuration rendered as TOML.
    #[must_use]
    pub fn default_config_content() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(var: impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        warn!("Ignoring {key}={raw}: not a valid value");
    }
    parsed
}

/// Expand a leading `~/` against the home directory.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
