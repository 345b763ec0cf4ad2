use std::time::Duration;

use log::warn;
use url::Url;

use crate::error::ConfigError;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Runtime settings, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the local backend listens
    pub backend_url: Url,
    /// Starting directory for the folder picker
    pub download_dir: String,
    /// Timeout for one-shot JSON calls; progress streams are never timed out
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            download_dir: DEFAULT_DOWNLOAD_DIR.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Bad values are logged and replaced by defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("AURA_BACKEND_URL") {
            match parse_backend_url(&raw) {
                Ok(url) => config.backend_url = url,
                Err(err) => warn!("{err}; using {DEFAULT_BACKEND_URL}"),
            }
        }

        if let Some(dir) = lookup("AURA_DOWNLOAD_DIR").filter(|d| !d.trim().is_empty()) {
            config.download_dir = dir;
        }

        if let Some(raw) = lookup("AURA_REQUEST_TIMEOUT_SECS") {
            match parse_secs(&raw) {
                Ok(timeout) => config.request_timeout = timeout,
                Err(err) => warn!("{err}; using {DEFAULT_TIMEOUT_SECS}s"),
            }
        }

        config
    }
}

fn default_backend_url() -> Url {
    Url::parse(DEFAULT_BACKEND_URL).expect("default backend URL is valid")
}

fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::BadUrl {
        key: "AURA_BACKEND_URL",
        source,
    })
}

fn parse_secs(raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::BadNumber {
            key: "AURA_REQUEST_TIMEOUT_SECS",
            value: raw.to_string(),
        })
}
