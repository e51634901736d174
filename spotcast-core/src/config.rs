use anyhow::{Context, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;
use url::Url;

use crate::{
    api::RetryPolicy,
    error::{Error, Result},
};

pub const DEFAULT_BASE_URL: &str = "https://api.sealegs.ai/v3";
pub const BASE_URL_VAR: &str = "SEALEGS_API_BASE_URL";
pub const API_KEY_VAR: &str = "SEALEGS_API_KEY";

/// Credentials saved by `spotcast configure`.
///
/// Example TOML:
/// api_key = "sk_live_..."
/// base_url = "https://api.sealegs.ai/v3"
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SavedConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl SavedConfig {
    /// Load the saved file. A missing file is an empty default; an unreadable
    /// or corrupt one is logged and ignored so environment-only setups keep
    /// working.
    pub fn load_or_default() -> Self {
        match Self::config_file_path() {
            Ok(path) => Self::load_or_default_from(&path),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "ignoring saved config");
                Self::default()
            }
        }
    }

    pub fn load_or_default_from(path: &Path) -> Self {
        Self::load_from(path).unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "ignoring saved config");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save to disk, creating parent directories as needed.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn config_file_path() -> anyhow::Result<PathBuf> {
        let dirs = ProjectDirs::from("ai", "sealegs", "spotcast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Key/value settings gathered from the environment and the local override file.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Merge `KEY=VALUE` lines without clobbering keys that are already set.
    pub fn merge_env_file(&mut self, contents: &str) {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            self.values
                .entry(key.trim().to_string())
                .or_insert_with(|| value.trim().to_string());
        }
    }

    /// Merge the override file at `path` if it exists.
    pub fn merge_env_path(&mut self, path: &Path) -> anyhow::Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read override file: {}", path.display()))?;
        self.merge_env_file(&contents);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    pub budget: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, budget: Duration) -> Result<Self> {
        let config = Self { interval, budget };
        config.validate()?;
        Ok(config)
    }

    /// A zero interval would hammer the status endpoint for the whole budget.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::Configuration(
                "Poll interval must be greater than zero".into(),
            ));
        }
        if self.budget.is_zero() {
            return Err(Error::Configuration(
                "Poll timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            budget: Duration::from_secs(300),
        }
    }
}

/// Everything the client and workflow need, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_key: String,
    pub poll: PollConfig,
    pub retry: RetryPolicy,
    /// Allow retrying create/refresh, which are billed per call.
    pub retry_billed: bool,
    pub request_timeout: Duration,
    pub list_limit: u32,
}

impl Config {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(missing_key());
        }

        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            api_key,
            poll: PollConfig::default(),
            retry: RetryPolicy::none(),
            retry_billed: false,
            request_timeout: Duration::from_secs(30),
            list_limit: 5,
        })
    }

    /// Resolve base URL and key: settings first, then the saved file.
    pub fn resolve(settings: &Settings, saved: &SavedConfig) -> Result<Self> {
        let base_url = settings
            .get(BASE_URL_VAR)
            .or(saved.base_url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL);

        let api_key = settings
            .get(API_KEY_VAR)
            .or(saved.api_key.as_deref())
            .ok_or_else(missing_key)?;

        Self::new(base_url, api_key)
    }
}

fn missing_key() -> Error {
    Error::Configuration(format!(
        "Set {API_KEY_VAR} environment variable.\n\
         Hint: export it, add it to a local .env file, or run `spotcast configure`."
    ))
}

/// Strip trailing slashes and make sure what's left is an http(s) URL.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');

    let url = Url::parse(trimmed)
        .map_err(|e| Error::Configuration(format!("Invalid base URL '{raw}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Configuration(format!(
            "Invalid base URL '{raw}': expected http or https"
        )));
    }

    Ok(trimmed.to_string())
}
