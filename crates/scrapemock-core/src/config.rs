//! Configuration for the fake store and executors.
//!
//! Configuration is stored in TOML format and supports environment variable
//! overrides with the `SCRAPEMOCK_` prefix.
//!
//! ## Example Configuration File
//!
//! ```toml
//! [store]
//! job_id = 1
//! scraper_name = "my-scraper"
//! allow_page_gid_override = false
//! allow_job_id_override = false
//!
//! [executor]
//! default_collection = "default"
//! max_per_page = 500
//! ```
//!
//! ```rust
//! use scrapemock_core::Config;
//!
//! let config = Config::from_toml_str("[store]\njob_id = 7\n")?;
//! assert_eq!(config.store.job_id, Some(7));
//! assert_eq!(config.executor.max_per_page, 500);
//! # Ok::<(), scrapemock_core::Error>(())
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_COLLECTION;
use crate::{Error, Result};

/// Environment variable overriding [`StoreConfig::job_id`].
pub const ENV_JOB_ID: &str = "SCRAPEMOCK_JOB_ID";
/// Environment variable overriding [`StoreConfig::scraper_name`].
pub const ENV_SCRAPER_NAME: &str = "SCRAPEMOCK_SCRAPER_NAME";
/// Environment variable overriding [`StoreConfig::allow_page_gid_override`].
pub const ENV_ALLOW_PAGE_GID_OVERRIDE: &str = "SCRAPEMOCK_ALLOW_PAGE_GID_OVERRIDE";
/// Environment variable overriding [`StoreConfig::allow_job_id_override`].
pub const ENV_ALLOW_JOB_ID_OVERRIDE: &str = "SCRAPEMOCK_ALLOW_JOB_ID_OVERRIDE";
/// Environment variable overriding [`ExecutorConfig::max_per_page`].
pub const ENV_MAX_PER_PAGE: &str = "SCRAPEMOCK_MAX_PER_PAGE";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record store settings.
    pub store: StoreConfig,
    /// Executor settings.
    pub executor: ExecutorConfig,
}

/// Initial state and override policies of a [`crate::RecordStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Current job id. `None` picks the next free id, which is 1 on a fresh
    /// store.
    pub job_id: Option<i64>,
    /// Current scraper name. `None` generates `scraper-<8 hex>`.
    pub scraper_name: Option<String>,
    /// Current page gid, stamped on outputs. `None` generates a random one.
    pub page_gid: Option<String>,
    /// Keep caller-supplied `gid`s on page insert.
    pub allow_page_gid_override: bool,
    /// Keep caller-supplied `job_id` / `_job_id` on page and output insert.
    pub allow_job_id_override: bool,
}

/// Executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Collection searched by `find_outputs` when none is given.
    pub default_collection: String,
    /// Upper bound for `per_page` in `find_outputs`.
    pub max_per_page: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_collection: DEFAULT_COLLECTION.to_owned(),
            max_per_page: 500,
        }
    }
}

impl Config {
    /// Parse configuration from TOML text. Missing tables and fields take
    /// their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from `path`, or defaults when the file does not
    /// exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to `path`. The parent directory must exist.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;
        Ok(())
    }

    /// Apply `SCRAPEMOCK_*` environment variables on top of this config.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`, keyed by environment variable
    /// name.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_JOB_ID) {
            self.store.job_id = Some(parse_override(ENV_JOB_ID, &raw)?);
        }
        if let Some(raw) = lookup(ENV_SCRAPER_NAME) {
            self.store.scraper_name = Some(raw);
        }
        if let Some(raw) = lookup(ENV_ALLOW_PAGE_GID_OVERRIDE) {
            self.store.allow_page_gid_override = parse_flag(ENV_ALLOW_PAGE_GID_OVERRIDE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ALLOW_JOB_ID_OVERRIDE) {
            self.store.allow_job_id_override = parse_flag(ENV_ALLOW_JOB_ID_OVERRIDE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_PER_PAGE) {
            self.executor.max_per_page = parse_override(ENV_MAX_PER_PAGE, &raw)?;
        }
        Ok(())
    }
}

fn parse_override<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {name}={raw}: {e}")))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::Config(format!("Invalid {name}={raw}: expected a boolean"))),
    }
}
