use std::path::{Path, PathBuf};
use std::time::Duration;

use analytics_client::config::DEFAULT_BASE_URL;
use analytics_client::{ClientConfig, PollConfig, ProxyConfig, ProxyType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, Result};

const CONFIG_FILE: &str = "config.toml";

/// Settings persisted in the CLI's TOML file.
///
/// The password is never stored here; it comes from a flag, the environment
/// or a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub email: Option<String>,
    /// Request timeout in seconds, 0 for none.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Upper bound on how long `run` waits for a result.
    pub max_poll_secs: Option<u64>,
    pub proxy: Option<ProxyConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            email: None,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            poll_interval_ms: 1000,
            max_poll_secs: None,
            proxy: None,
        }
    }
}

impl AppConfig {
    /// `<config dir>/analytics/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("analytics").join(CONFIG_FILE))
            .ok_or_else(|| CliError::InvalidInput("could not determine the config directory".into()))
    }

    fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::default_path(),
        }
    }

    /// Load from `path` or the default location; a missing file yields the
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = Self::resolve_path(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.show()?)?;
        Ok(path)
    }

    pub fn reset(path: Option<&Path>) -> Result<PathBuf> {
        Self::default().save(path)
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Library configuration with the command-line overrides applied.
    pub fn client_config(&self, overrides: &Overrides) -> Result<ClientConfig> {
        let base_url = overrides.base_url.as_deref().unwrap_or(&self.base_url);
        let mut config = ClientConfig::new(base_url)?;

        config.timeout = Duration::from_secs(overrides.timeout_secs.unwrap_or(self.timeout_secs));
        config.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        config.poll = PollConfig {
            interval: Duration::from_millis(overrides.poll_interval_ms.unwrap_or(self.poll_interval_ms)),
            max_polls: None,
            max_duration: overrides
                .max_poll_secs
                .or(self.max_poll_secs)
                .map(Duration::from_secs),
        };
        config.proxy = match &overrides.proxy {
            Some(url) => Some(ProxyConfig {
                url: url.clone(),
                proxy_type: ProxyType::All,
                auth: None,
            }),
            None => self.proxy.clone(),
        };
        Ok(config)
    }
}

/// Values given on the command line for this invocation only.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub proxy: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub max_poll_secs: Option<u64>,
}
