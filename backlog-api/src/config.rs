use crate::clerk::DEFAULT_API_URL;
use backlog_common::util::{NonPositiveDurationError, PositiveDuration};
use backlog_db::config::MongoConfig;
use serde::Deserialize;
use std::{
    fmt::{Debug, Formatter},
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error reading config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error parsing config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid request timeout: {0}")]
    RequestTimeout(#[from] NonPositiveDurationError),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub mongodb: MongoConfig,
    pub clerk: ClerkConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClerkConfig {
    pub api_key: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Accepted `azp` claims. Empty accepts any.
    #[serde(default)]
    pub authorized_parties: Vec<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_owned()
}

impl Debug for ClerkConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClerkConfig")
            .field("api_key", &"[redacted]")
            .field("api_url", &self.api_url)
            .field("authorized_parties", &self.authorized_parties)
            .finish()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsConfig {
    /// Any origin is allowed when empty.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Reads `{config_dir}/.env.{app_env}`.
    pub fn load(config_dir: &Path, app_env: &str) -> Result<Self, ConfigError> {
        let path = config_dir.join(format!(".env.{app_env}"));
        let contents =
            std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.request_timeout()?;

        Ok(config)
    }

    pub fn request_timeout(&self) -> Result<PositiveDuration, NonPositiveDurationError> {
        PositiveDuration::try_from(Duration::from_secs(self.request_timeout_secs))
    }
}
