use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::City;

/// Placeholder in the provider URL template replaced by the city key.
pub const CITY_ID_PLACEHOLDER: &str = "$$CITY_ID$$";

pub const DEFAULT_CITY_KEY: &str = "924938";
pub const DEFAULT_CITY_LABEL: &str = "Kyiv, UA";

const DEFAULT_WEATHER_API_URL: &str = "https://query.yahooapis.com/v1/public/yql?format=json&q=select%20*%20from%20weather.forecast%20where%20woeid=$$CITY_ID$$%20and%20u=%27c%27";
const DEFAULT_DATA_ORIGIN: &str = "https://query.yahooapis.com/";
const DEFAULT_USER_AGENT: &str = "Weatherdeck/0.1.0";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line summary of all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the city store and the cache database
    pub data_dir: PathBuf,

    /// Forecast provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Shell asset manifest served cache-first by the proxy
    #[serde(default)]
    pub shell: ShellConfig,

    /// Cache storage settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// City store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Dashboard behaviour
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Forecast URL template; `$$CITY_ID$$` is replaced by the city key
    pub url_template: String,

    /// Requests whose URL starts with this origin are treated as forecast data
    pub data_origin: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_WEATHER_API_URL.to_string(),
            data_origin: DEFAULT_DATA_ORIGIN.to_string(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ProviderConfig {
    /// Build the forecast URL for a city key.
    ///
    /// The key is percent-encoded so slugs cannot break out of the query.
    pub fn forecast_url(&self, city_key: &str) -> String {
        self.url_template
            .replace(CITY_ID_PLACEHOLDER, &urlencode(city_key))
    }
}

fn urlencode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Base URL the shell asset paths are resolved against
    pub origin: String,

    /// Prefix of the versioned shell cache partition
    pub cache_prefix: String,

    /// Bumped whenever the asset list changes
    pub version: u32,

    /// Asset paths relative to `origin`, e.g. `index.html`, `js/app.js`
    #[serde(default)]
    pub assets: Vec<String>,
}

impl Default for ShellConfig {
    /// No shell assets: a terminal dashboard has no page to serve, and an
    /// empty manifest installs without reaching any server, so the data
    /// cache is live from the first run.
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080/".to_string(),
            cache_prefix: "weatherdeck".to_string(),
            version: 22,
            assets: Vec::new(),
        }
    }
}

impl ShellConfig {
    /// Name of the shell cache partition for the current version.
    pub fn cache_name(&self) -> String {
        format!("{}-v{}", self.cache_prefix, self.version)
    }
}

/// Where cache partitions live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// SQLite file in the data directory, survives restarts
    #[default]
    Sqlite,
    /// Process memory only
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// File name of the cache database inside `data_dir`
    #[serde(default = "default_cache_file")]
    pub db_file: String,

    /// Stable name of the forecast data partition
    #[serde(default = "default_data_cache_name")]
    pub data_cache_name: String,
}

fn default_cache_file() -> String {
    "cache.db".to_string()
}

fn default_data_cache_name() -> String {
    "weatherdeck-data".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            db_file: default_cache_file(),
            data_cache_name: default_data_cache_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// File name of the city database inside `data_dir`
    #[serde(default = "default_store_file")]
    pub db_file: String,
}

fn default_store_file() -> String {
    "cities.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_file: default_store_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// City seeded when the store is empty
    pub default_city: City,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_city: City::new(DEFAULT_CITY_KEY, DEFAULT_CITY_LABEL),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weatherdeck");

        Self {
            data_dir,
            provider: ProviderConfig::default(),
            shell: ShellConfig::default(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors; warnings are
    /// logged and returned alongside the config.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        // Provider template must carry the placeholder and parse once filled in
        if !self.provider.url_template.contains(CITY_ID_PLACEHOLDER) {
            result.add_error(
                "provider.url_template",
                format!("Template must contain {}", CITY_ID_PLACEHOLDER),
            );
        }
        self.validate_url(
            &self.provider.forecast_url(DEFAULT_CITY_KEY),
            "provider.url_template",
            &mut result,
        );
        self.validate_url(&self.provider.data_origin, "provider.data_origin", &mut result);

        if !self.provider.url_template.starts_with(&self.provider.data_origin) {
            result.add_warning(
                "provider.data_origin",
                "Forecast URLs are outside the data origin and will not be cached",
            );
        }

        if self.provider.timeout_secs == 0 {
            result.add_error("provider.timeout_secs", "Timeout must be greater than 0");
        }

        self.validate_url(&self.shell.origin, "shell.origin", &mut result);

        if self.shell.cache_prefix.trim().is_empty() {
            result.add_error("shell.cache_prefix", "Cache prefix cannot be empty");
        }

        if self.cache.data_cache_name.trim().is_empty() {
            result.add_error("cache.data_cache_name", "Data cache name cannot be empty");
        } else if self.cache.data_cache_name == self.shell.cache_name() {
            result.add_error(
                "cache.data_cache_name",
                "Data cache name collides with the shell cache name",
            );
        } else if self
            .cache
            .data_cache_name
            .starts_with(&format!("{}-v", self.shell.cache_prefix))
        {
            result.add_warning(
                "cache.data_cache_name",
                "Data cache name looks versioned like a shell cache",
            );
        }

        if self.dashboard.default_city.key.trim().is_empty() {
            result.add_error("dashboard.default_city.key", "Default city key cannot be empty");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the city store database
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store.db_file)
    }

    /// Path of the cache database
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.cache.db_file)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("weatherdeck");

        Ok(config_dir.join("config.toml"))
    }
}
