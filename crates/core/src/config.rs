//! Configuration management
//!
//! Loads and saves the bz configuration file. The file is TOML and lives at
//! `$BZ_CONFIG_DIR/config.toml`, falling back to `<config dir>/bz/config.toml`.
//!
//! Changes to `schema_version` need a migration in [`ConfigManager::migrate`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alias::Alias;
use crate::error::{Error, Result};
use crate::partition::DEFAULT_CONCURRENCY;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "BZ_CONFIG_DIR";

const DEFAULT_OUTPUT: &str = "human";

const DEFAULT_COLOR: &str = "auto";

/// Files at least this large are uploaded as large files: 200 MB
pub const DEFAULT_LARGE_THRESHOLD: u64 = 200_000_000;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub aliases: Vec<Alias>,
}

/// Default settings for CLI behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Color mode: "auto", "always", or "never"
    #[serde(default = "default_color")]
    pub color: String,

    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Part size for large uploads; the service recommendation when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_size: Option<u64>,

    /// Parts uploaded at once
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Size at which `put` switches to a large upload
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u64,
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_true() -> bool {
    true
}

fn default_threads() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_large_threshold() -> u64 {
    DEFAULT_LARGE_THRESHOLD
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            progress: true,
            part_size: None,
            threads: default_threads(),
            large_threshold: default_large_threshold(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            aliases: Vec::new(),
        }
    }
}

/// Loads and saves the configuration file
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Use `$BZ_CONFIG_DIR` or the platform config directory
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("bz"),
        };
        Ok(Self {
            config_path: config_dir.join("config.toml"),
        })
    }

    /// Use an explicit file (tests)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration, or the defaults if there is no file yet
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. \
                 Please upgrade bz.",
                config.schema_version, SCHEMA_VERSION
            )));
        }
        if config.schema_version < SCHEMA_VERSION {
            return self.migrate(config);
        }

        Ok(config)
    }

    /// Write the configuration, creating parent directories.
    ///
    /// The file holds application keys, so on unix it is made 0600.
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        tracing::debug!(path = %self.config_path.display(), "configuration saved");
        Ok(())
    }

    fn migrate(&self, mut config: Config) -> Result<Config> {
        tracing::info!(
            from = config.schema_version,
            to = SCHEMA_VERSION,
            "migrating configuration"
        );
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}
