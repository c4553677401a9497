//! Alias management
//!
//! An alias names one account on a storage endpoint: where to authorize and
//! which application key to use.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Endpoint used when an alias does not name one
pub const DEFAULT_ENDPOINT: &str = "https://api.backblazeb2.com";

/// Retry configuration for an alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), doubling each time
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

/// Timeout configuration for an alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    120000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// A named account on a storage endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    /// Unique name for this alias
    pub name: String,

    /// Authorization endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Application key id
    pub key_id: String,

    /// Application key
    pub application_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Alias {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        key_id: impl Into<String>,
        application_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            key_id: key_id.into(),
            application_key: application_key.into(),
            retry: None,
            timeout: None,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn timeout_config(&self) -> TimeoutConfig {
        self.timeout.clone().unwrap_or_default()
    }

    /// Check the name and endpoint before the alias is stored
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidArgument(format!(
                "alias name '{}' may only contain letters, digits, '-' and '_'",
                self.name
            )));
        }
        let url = url::Url::parse(&self.endpoint)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidArgument(format!(
                "endpoint must be http or https: {}",
                self.endpoint
            )));
        }
        Ok(())
    }
}

/// Reads and writes the aliases stored in the config file
pub struct AliasManager {
    config_manager: ConfigManager,
}

impl AliasManager {
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Use the default config location
    pub fn new() -> Result<Self> {
        ConfigManager::new().map(Self::with_config_manager)
    }

    pub fn list(&self) -> Result<Vec<Alias>> {
        Ok(self.config_manager.load()?.aliases)
    }

    pub fn get(&self, name: &str) -> Result<Alias> {
        self.list()?
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::AliasNotFound(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|a| a.name == name))
    }

    /// Add or replace an alias
    pub fn set(&self, alias: Alias) -> Result<()> {
        alias.validate()?;
        self.update(|aliases| {
            aliases.retain(|a| a.name != alias.name);
            aliases.push(alias);
            Ok(())
        })
    }

    /// Add an alias, failing if the name is taken
    pub fn add(&self, alias: Alias) -> Result<()> {
        alias.validate()?;
        self.update(|aliases| {
            if aliases.iter().any(|a| a.name == alias.name) {
                return Err(Error::AliasExists(alias.name));
            }
            aliases.push(alias);
            Ok(())
        })
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        self.update(|aliases| {
            let before = aliases.len();
            aliases.retain(|a| a.name != name);
            if aliases.len() == before {
                return Err(Error::AliasNotFound(name.to_string()));
            }
            Ok(())
        })
    }

    /// Load, edit and save in one step; nothing is written when `edit` fails
    fn update(&self, edit: impl FnOnce(&mut Vec<Alias>) -> Result<()>) -> Result<()> {
        let mut config = self.config_manager.load()?;
        edit(&mut config.aliases)?;
        self.config_manager.save(&config)
    }
}
