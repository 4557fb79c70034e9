//! Configuration management for Cadence

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::types::{Platform, DEFAULT_MAX_RETRIES, DEFAULT_PLATFORMS};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    pub generator: Option<GeneratorConfig>,
    #[serde(default)]
    pub platforms: PlatformsConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Timers and retry bookkeeping of the scheduler
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Seconds between publish passes
    pub poll_interval: u64,
    /// Seconds a Post waits after a pass in which every platform failed
    pub retry_delay: i64,
    /// Retry budget given to newly created Posts
    pub max_retries: u32,
    /// UTC hour at which weekly and monthly expansion run
    pub daily_run_hour: u32,
    /// Seconds after which an unreleased publish lease may be taken over
    pub publish_lease: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: 60,
            retry_delay: 300,
            max_retries: DEFAULT_MAX_RETRIES,
            daily_run_hour: 0,
            publish_lease: 600,
        }
    }
}

impl SchedulingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval == 0 {
            return Err(invalid("scheduling.poll_interval", "must be at least 1 second"));
        }
        if self.retry_delay < 0 {
            return Err(invalid("scheduling.retry_delay", "must not be negative"));
        }
        if self.daily_run_hour > 23 {
            return Err(invalid("scheduling.daily_run_hour", "must be between 0 and 23"));
        }
        if self.publish_lease <= 0 {
            return Err(invalid("scheduling.publish_lease", "must be positive"));
        }
        Ok(())
    }
}

/// Per-platform retry policy of the publisher
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub max_attempts: u32,
    /// Delay unit in milliseconds; attempt `n` waits `n * backoff_ms` before the next one
    pub backoff_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
        }
    }
}

/// OpenAI-compatible generation endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_base_url")]
    pub base_url: String,
    #[serde(default = "default_text_model")]
    pub model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_generator_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_text_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Credentials of one connected platform account.
#[derive(Clone, Deserialize)]
pub struct PlatformAccountConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub access_token: String,
    /// Page, profile or user id the account posts as
    pub account_id: String,
    /// Override of the platform API base URL
    pub api_base: Option<String>,
}

fn default_true() -> bool {
    true
}

impl fmt::Debug for PlatformAccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformAccountConfig")
            .field("enabled", &self.enabled)
            .field("access_token", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformsConfig {
    pub linkedin: Option<PlatformAccountConfig>,
    pub facebook: Option<PlatformAccountConfig>,
    pub twitter: Option<PlatformAccountConfig>,
    pub instagram: Option<PlatformAccountConfig>,
}

impl PlatformsConfig {
    /// Enabled account for `platform`, if any
    pub fn account(&self, platform: Platform) -> Option<&PlatformAccountConfig> {
        let account = match platform {
            Platform::LinkedIn => self.linkedin.as_ref(),
            Platform::Facebook => self.facebook.as_ref(),
            Platform::Twitter => self.twitter.as_ref(),
            Platform::Instagram => self.instagram.as_ref(),
        };
        account.filter(|a| a.enabled)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Owner used by the operator CLI when none is given
    pub owner: String,
    pub platforms: Vec<Platform>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            owner: "default".to_string(),
            platforms: DEFAULT_PLATFORMS.to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.scheduling.validate()?;
        if config.publisher.max_attempts == 0 {
            return Err(invalid("publisher.max_attempts", "must be at least 1"));
        }
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/cadence/cadence.db".to_string(),
            },
            scheduling: SchedulingConfig::default(),
            publisher: PublisherConfig::default(),
            generator: None,
            platforms: PlatformsConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }

    /// Database path after applying `CADENCE_DB_PATH` and tilde expansion
    pub fn database_path(&self) -> PathBuf {
        let raw = std::env::var("CADENCE_DB_PATH").unwrap_or_else(|_| self.database.path.clone());
        PathBuf::from(shellexpand::tilde(&raw).to_string())
    }
}

fn invalid(field: &str, reason: &str) -> crate::error::CadenceError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Resolve the configuration file path following XDG Base Directory conventions
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CADENCE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("cadence").join("config.toml"))
}
